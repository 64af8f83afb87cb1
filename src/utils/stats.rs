// src/utils/stats.rs

use std::ops::AddAssign;

/// Names of the five-number summary, in output order.
pub const STAT_NAMES: [&str; 5] = ["sum", "mean", "std", "min", "max"];

/// Neumaier-compensated accumulator. The compensation term carries the
/// low-order bits lost by each addition.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeumaierSum {
    sum: f64,
    compensation: f64,
}

impl NeumaierSum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

impl AddAssign<f64> for NeumaierSum {
    fn add_assign(&mut self, value: f64) {
        self.add(value);
    }
}

impl FromIterator<f64> for NeumaierSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = NeumaierSum::new();
        for v in iter {
            acc.add(v);
        }
        acc
    }
}

pub fn compensated_sum<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values.into_iter().collect::<NeumaierSum>().value()
}

/// sum, mean, std (population), min, max. An empty slice gives all zeros.
pub fn calc_stats(values: &[f64]) -> [f64; 5] {
    if values.is_empty() {
        return [0.0; 5];
    }
    let n = values.len() as f64;
    let sum = compensated_sum(values.iter().copied());
    let mean = sum / n;
    let var = compensated_sum(values.iter().map(|v| (v - mean) * (v - mean))) / n;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    [sum, mean, var.sqrt(), min, max]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_numbers() {
        let s = calc_stats(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(s[0], 10.0);
        assert_eq!(s[1], 2.5);
        assert!((s[2] - 1.25f64.sqrt()).abs() < 1e-12);
        assert_eq!(s[3], 1.0);
        assert_eq!(s[4], 4.0);
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(calc_stats(&[]), [0.0; 5]);
    }

    #[test]
    fn test_compensation_recovers_small_terms() {
        // Naive summation returns 0.0 here
        let values = [1.0, 1e100, 1.0, -1e100];
        assert_eq!(compensated_sum(values), 2.0);
    }
}
