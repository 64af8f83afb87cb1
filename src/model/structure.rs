// src/model/structure.rs

use crate::error::{Result, SroError};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Atom {
    /// Identifier referenced by neighbor slots. Must be positive.
    pub id: i64,
    /// Atomic number (or a compact local type before remapping).
    #[serde(rename = "type")]
    pub atom_type: u32,
    pub position: [f64; 3],
}

impl Atom {
    pub fn new(id: i64, atom_type: u32, position: [f64; 3]) -> Self {
        Self {
            id,
            atom_type,
            position,
        }
    }
}

/// One simulation snapshot: atoms plus the box they live in.
///
/// Periodicity and bounds belong to the snapshot, not to atoms.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub atoms: Vec<Atom>,
    /// Box bounds per axis: [[xlo, xhi], [ylo, yhi], [zlo, zhi]]
    pub bounds: [[f64; 2]; 3],
    #[serde(default = "default_pbc")]
    pub pbc: [bool; 3],

    #[serde(skip)]
    index: HashMap<i64, usize>,
}

fn default_pbc() -> [bool; 3] {
    [true, true, true]
}

impl Snapshot {
    pub fn new(atoms: Vec<Atom>, bounds: [[f64; 2]; 3], pbc: [bool; 3]) -> Self {
        let mut snapshot = Self {
            atoms,
            bounds,
            pbc,
            index: HashMap::new(),
        };
        snapshot.reindex();
        snapshot
    }

    /// Reads a JSON snapshot and builds the id lookup.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut snapshot: Self = serde_json::from_reader(reader)?;
        snapshot.reindex();
        Ok(snapshot)
    }

    /// Rebuilds the id -> position lookup. Needed after deserializing.
    pub fn reindex(&mut self) {
        self.index = self
            .atoms
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id, i))
            .collect();
    }

    pub fn get(&self, id: i64) -> Option<&Atom> {
        self.index.get(&id).map(|&i| &self.atoms[i])
    }

    pub fn index_of(&self, id: i64) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Translates compact 1-based local types to real atomic numbers.
    ///
    /// `mapping[t - 1]` is the atomic number of local type `t`, e.g. `[29, 40]`
    /// for a Cu-Zr system.
    pub fn with_type_mapping(mut self, mapping: &[u32]) -> Result<Self> {
        for atom in &mut self.atoms {
            let slot = (atom.atom_type as usize)
                .checked_sub(1)
                .filter(|&s| s < mapping.len())
                .ok_or(SroError::InvalidTypeMapping {
                    local_type: atom.atom_type,
                    len: mapping.len(),
                })?;
            atom.atom_type = mapping[slot];
        }
        Ok(self)
    }

    pub fn box_lengths(&self) -> [f64; 3] {
        [
            self.bounds[0][1] - self.bounds[0][0],
            self.bounds[1][1] - self.bounds[1][0],
            self.bounds[2][1] - self.bounds[2][0],
        ]
    }

    /// Bond vector from `from` to `to` under the minimum image convention on
    /// the periodic axes.
    pub fn minimum_image(&self, from: [f64; 3], to: [f64; 3]) -> Vector3<f64> {
        let lengths = self.box_lengths();
        let mut d = Vector3::from(to) - Vector3::from(from);
        for axis in 0..3 {
            let l = lengths[axis];
            if self.pbc[axis] && l > 0.0 {
                d[axis] -= l * (d[axis] / l).round();
            }
        }
        d
    }
}
