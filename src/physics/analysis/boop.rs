// src/physics/analysis/boop.rs
// Bond-orientational order parameters (Steinhardt Q_l and normalised W_l),
// direct and coarse-grained over the first shell.

use crate::error::{Result, SroError};
use crate::model::{FeatureTable, NeighborTopology, Provider, Snapshot, TopologyColumn};
use crate::physics::harmonics::{spherical_harmonics, Wigner3jTable, MAX_ORDER};
use crate::pipeline::{finish, map_rows, FeatureContext, Featurizer};
use crate::utils::stats::NeumaierSum;
use nalgebra::Vector3;
use num_complex::Complex64;
use std::collections::HashMap;
use std::f64::consts::PI;

pub const DEFAULT_ORDERS: [usize; 4] = [4, 6, 8, 10];

/// q_lm per configured order; `None` for an atom without bonds.
type Harmonics = Option<Vec<Vec<Complex64>>>;

/// Compensated complex accumulator
#[derive(Clone, Copy, Default)]
struct ComplexSum {
    re: NeumaierSum,
    im: NeumaierSum,
}

impl ComplexSum {
    fn add(&mut self, z: Complex64) {
        self.re.add(z.re);
        self.im.add(z.im);
    }

    fn value(&self) -> Complex64 {
        Complex64::new(self.re.value(), self.im.value())
    }
}

/// Q_l, W̄_l and their coarse-grained forms for each order in `orders`.
///
/// Bonds run from an atom to each neighbor id in its topology row, wrapped
/// by the minimum image on periodic axes.
#[derive(Clone, Debug)]
pub struct Boop {
    pub provider: Provider,
    pub orders: Vec<usize>,
    pub coarse_grained: bool,
}

impl Default for Boop {
    fn default() -> Self {
        Self {
            provider: Provider::Voro,
            orders: DEFAULT_ORDERS.to_vec(),
            coarse_grained: true,
        }
    }
}

impl Boop {
    pub fn new(provider: Provider, orders: Vec<usize>, coarse_grained: bool) -> Self {
        Self {
            provider,
            orders,
            coarse_grained,
        }
    }

    /// Mean of Y_lm over the atom's bonds
    fn local_harmonics(
        &self,
        snapshot: &Snapshot,
        atom_id: i64,
        neighbor_ids: impl Iterator<Item = i64>,
    ) -> Result<Harmonics> {
        let center = snapshot.get(atom_id).ok_or(SroError::UnknownAtom(atom_id))?;

        let mut sums: Vec<Vec<ComplexSum>> = self
            .orders
            .iter()
            .map(|&l| vec![ComplexSum::default(); 2 * l + 1])
            .collect();
        let mut n_bonds = 0usize;

        for nid in neighbor_ids {
            let neighbor = snapshot.get(nid).ok_or(SroError::UnknownNeighbor {
                atom_id,
                neighbor_id: nid,
            })?;
            let bond: Vector3<f64> = snapshot.minimum_image(center.position, neighbor.position);
            let mut counted = false;
            for (sum, &l) in sums.iter_mut().zip(&self.orders) {
                if let Some(ylm) = spherical_harmonics(l, &bond) {
                    for (acc, y) in sum.iter_mut().zip(ylm) {
                        acc.add(y);
                    }
                    counted = true;
                }
            }
            if counted {
                n_bonds += 1;
            }
        }

        if n_bonds == 0 {
            return Ok(None);
        }
        let n = n_bonds as f64;
        Ok(Some(
            sums.iter()
                .map(|sum| sum.iter().map(|acc| acc.value() / n).collect())
                .collect(),
        ))
    }

    /// Shell average of q_lm over the atom and its neighbors
    fn coarse_harmonics(
        &self,
        local: &[Harmonics],
        rows_by_id: &HashMap<i64, usize>,
        topology: &NeighborTopology,
        row: usize,
    ) -> Result<Harmonics> {
        let own = match &local[row] {
            Some(q) => q,
            None => return Ok(None),
        };

        let mut sums: Vec<Vec<ComplexSum>> = own
            .iter()
            .map(|q_l| vec![ComplexSum::default(); q_l.len()])
            .collect();
        let mut accumulate = |q: &Vec<Vec<Complex64>>| {
            for (sum, q_l) in sums.iter_mut().zip(q) {
                for (acc, &z) in sum.iter_mut().zip(q_l) {
                    acc.add(z);
                }
            }
        };

        accumulate(own);
        let mut members = 1usize;

        // Neighbors without bonds count as members with zero q_lm
        let atom_id = topology.atom_ids[row];
        for nid in topology.records[row].neighbor_ids(topology.neighbor_limit) {
            let j = *rows_by_id.get(&nid).ok_or(SroError::UnknownNeighbor {
                atom_id,
                neighbor_id: nid,
            })?;
            members += 1;
            if let Some(q) = &local[j] {
                accumulate(q);
            }
        }

        let n = members as f64;
        Ok(Some(
            sums.iter()
                .map(|sum| sum.iter().map(|acc| acc.value() / n).collect())
                .collect(),
        ))
    }

    /// (Q_l, W̄_l) per order, zeros for an atom without bonds
    fn invariants(&self, tables: &[Wigner3jTable], q: &Harmonics) -> (Vec<f64>, Vec<f64>) {
        let n = self.orders.len();
        let q = match q {
            Some(q) => q,
            None => return (vec![0.0; n], vec![0.0; n]),
        };

        let mut ql = Vec::with_capacity(n);
        let mut wl = Vec::with_capacity(n);
        for ((&l, table), q_l) in self.orders.iter().zip(tables).zip(q) {
            let norm: f64 = q_l.iter().map(|z| z.norm_sqr()).collect::<NeumaierSum>().value();
            ql.push((4.0 * PI / (2 * l + 1) as f64 * norm).sqrt());
            wl.push(if norm > 0.0 {
                table.contract(q_l) / norm.powf(1.5)
            } else {
                0.0
            });
        }
        (ql, wl)
    }
}

impl Featurizer for Boop {
    fn label(&self) -> &'static str {
        "BOOP"
    }

    fn provider(&self) -> Provider {
        self.provider
    }

    fn required_columns(&self) -> Vec<TopologyColumn> {
        vec![TopologyColumn::NeighborCount, TopologyColumn::NeighborId]
    }

    fn feature_names(&self) -> Vec<String> {
        let p = self.provider;
        let mut names = Vec::with_capacity(4 * self.orders.len());
        names.extend(self.orders.iter().map(|l| format!("q_{} {}", l, p)));
        names.extend(self.orders.iter().map(|l| format!("w_{} {}", l, p)));
        names.extend(
            self.orders
                .iter()
                .map(|l| format!("Coarse-grained q_{} {}", l, p)),
        );
        names.extend(
            self.orders
                .iter()
                .map(|l| format!("Coarse-grained w_{} {}", l, p)),
        );
        names
    }

    fn transform(&self, ctx: &FeatureContext, _prior: &FeatureTable) -> Result<FeatureTable> {
        if let Some(&l) = self.orders.iter().find(|&&l| l > MAX_ORDER) {
            return Err(SroError::InvalidConfig(format!(
                "BOOP order {} exceeds the supported maximum {}",
                l, MAX_ORDER
            )));
        }
        let snapshot = ctx.snapshot()?;
        let topology = ctx.topology;
        let limit = topology.neighbor_limit;
        let tables: Vec<Wigner3jTable> = self.orders.iter().map(|&l| Wigner3jTable::new(l)).collect();

        // Pass 1: q_lm of every atom
        let local: Vec<Harmonics> = map_rows(topology.len(), ctx.parallel, |i| {
            self.local_harmonics(
                snapshot,
                topology.atom_ids[i],
                topology.records[i].neighbor_ids(limit),
            )
        })?;

        // Pass 2: invariants, coarse-graining over neighbor rows
        let rows_by_id: HashMap<i64, usize> = topology
            .atom_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();
        let n = self.orders.len();

        let rows = map_rows(topology.len(), ctx.parallel, |i| {
            let (ql, wl) = self.invariants(&tables, &local[i]);
            let (cql, cwl) = if self.coarse_grained {
                let coarse = self.coarse_harmonics(&local, &rows_by_id, topology, i)?;
                self.invariants(&tables, &coarse)
            } else {
                (vec![0.0; n], vec![0.0; n])
            };
            let mut row = Vec::with_capacity(4 * n);
            row.extend(ql);
            row.extend(wl);
            row.extend(cql);
            row.extend(cwl);
            Ok(row)
        })?;
        finish(ctx, self.feature_names(), rows)
    }
}
