// src/physics/harmonics.rs
// Spherical harmonics and Wigner 3j symbols for the bond-orientational
// order parameters.

use crate::utils::stats::NeumaierSum;
use nalgebra::Vector3;
use num_complex::Complex64;
use std::f64::consts::PI;
use std::sync::OnceLock;

/// Highest supported harmonic order
pub const MAX_ORDER: usize = 12;

const FACTORIAL_LEN: usize = 3 * MAX_ORDER + 2;

fn factorial(n: usize) -> f64 {
    static TABLE: OnceLock<[f64; FACTORIAL_LEN]> = OnceLock::new();
    let table = TABLE.get_or_init(|| {
        let mut t = [1.0; FACTORIAL_LEN];
        for i in 1..FACTORIAL_LEN {
            t[i] = t[i - 1] * i as f64;
        }
        t
    });
    table
        .get(n)
        .copied()
        .unwrap_or_else(|| (1..=n).fold(1.0, |acc, k| acc * k as f64))
}

/// Associated Legendre function P_l^m(x), Condon-Shortley phase included
///
/// # Algorithm
/// Upward recurrence in l starting from P_m^m (Numerical Recipes §6.7)
fn assoc_legendre(l: usize, m: usize, x: f64) -> f64 {
    let somx2 = ((1.0 - x) * (1.0 + x)).sqrt();
    let mut pmm = 1.0;
    let mut fact = 1.0;
    for _ in 0..m {
        pmm *= -fact * somx2;
        fact += 2.0;
    }
    if l == m {
        return pmm;
    }

    let mut pmmp1 = x * (2 * m + 1) as f64 * pmm;
    if l == m + 1 {
        return pmmp1;
    }

    let mut pll = 0.0;
    for ll in (m + 2)..=l {
        pll = (x * (2 * ll - 1) as f64 * pmmp1 - (ll + m - 1) as f64 * pmm) / (ll - m) as f64;
        pmm = pmmp1;
        pmmp1 = pll;
    }
    pll
}

/// Y_l^m along `bond` for m = -l..=l, stored at index `m + l`.
///
/// Returns `None` for a zero-length or non-finite bond.
///
/// # Formula
/// ```text
/// Y_l^m(θ, φ)  = sqrt((2l+1)/4π · (l-m)!/(l+m)!) · P_l^m(cos θ) · e^{imφ}
/// Y_l^{-m}     = (-1)^m · conj(Y_l^m)
/// ```
pub fn spherical_harmonics(l: usize, bond: &Vector3<f64>) -> Option<Vec<Complex64>> {
    let r = bond.norm();
    if r == 0.0 || !r.is_finite() {
        return None;
    }
    let cos_theta = (bond.z / r).clamp(-1.0, 1.0);
    let phi = bond.y.atan2(bond.x);

    let mut ylm = vec![Complex64::new(0.0, 0.0); 2 * l + 1];
    for m in 0..=l {
        let norm = ((2 * l + 1) as f64 / (4.0 * PI) * factorial(l - m) / factorial(l + m)).sqrt();
        let y = Complex64::from_polar(norm * assoc_legendre(l, m, cos_theta), m as f64 * phi);
        ylm[l + m] = y;
        if m > 0 {
            let sign = if m % 2 == 0 { 1.0 } else { -1.0 };
            ylm[l - m] = y.conj() * sign;
        }
    }
    Some(ylm)
}

/// Wigner 3j symbol (l1 l2 l3; m1 m2 m3)
///
/// # Formula
/// Racah's closed form: a finite alternating sum over k of inverse
/// factorial products. Zero when the selection rules fail.
pub fn wigner_3j(l1: i64, l2: i64, l3: i64, m1: i64, m2: i64, m3: i64) -> f64 {
    if m1 + m2 + m3 != 0
        || l3 < (l1 - l2).abs()
        || l3 > l1 + l2
        || m1.abs() > l1
        || m2.abs() > l2
        || m3.abs() > l3
    {
        return 0.0;
    }

    let f = |n: i64| factorial(n as usize);

    let delta = f(l1 + l2 - l3) * f(l1 - l2 + l3) * f(-l1 + l2 + l3) / f(l1 + l2 + l3 + 1);
    let prefactor = (delta
        * f(l1 + m1)
        * f(l1 - m1)
        * f(l2 + m2)
        * f(l2 - m2)
        * f(l3 + m3)
        * f(l3 - m3))
        .sqrt();

    let k_min = 0.max(l2 - l3 - m1).max(l1 - l3 + m2);
    let k_max = (l1 + l2 - l3).min(l1 - m1).min(l2 + m2);

    let mut sum = NeumaierSum::new();
    for k in k_min..=k_max {
        let denom = f(k)
            * f(l3 - l2 + k + m1)
            * f(l3 - l1 + k - m2)
            * f(l1 + l2 - l3 - k)
            * f(l1 - k - m1)
            * f(l2 - k + m2);
        let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
        sum += sign / denom;
    }

    let phase = if (l1 - l2 - m3).rem_euclid(2) == 0 {
        1.0
    } else {
        -1.0
    };
    phase * prefactor * sum.value()
}

/// Non-zero (l l l; m1 m2 m3) symbols for one order, indices shifted by l.
///
/// Built once per order and reused for every atom.
#[derive(Clone, Debug)]
pub struct Wigner3jTable {
    l: usize,
    entries: Vec<(usize, usize, usize, f64)>,
}

impl Wigner3jTable {
    pub fn new(l: usize) -> Self {
        let li = l as i64;
        let mut entries = Vec::new();
        for m1 in -li..=li {
            for m2 in -li..=li {
                let m3 = -m1 - m2;
                if m3.abs() > li {
                    continue;
                }
                let w = wigner_3j(li, li, li, m1, m2, m3);
                if w != 0.0 {
                    entries.push(((m1 + li) as usize, (m2 + li) as usize, (m3 + li) as usize, w));
                }
            }
        }
        Self { l, entries }
    }

    pub fn order(&self) -> usize {
        self.l
    }

    /// Real part of Σ (l l l; m1 m2 m3) q_m1 q_m2 q_m3
    pub fn contract(&self, q: &[Complex64]) -> f64 {
        self.entries
            .iter()
            .map(|&(a, b, c, w)| w * (q[a] * q[b] * q[c]).re)
            .collect::<NeumaierSum>()
            .value()
    }
}
