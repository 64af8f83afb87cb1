// src/model/radii.rs

use crate::error::{Result, SroError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Radius convention used by the packing engines
///
/// - Miracle: radii fitted to metallic-glass packing (Miracle et al.) - DEFAULT
/// - Atomic: conventional atomic radii
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum RadiusType {
    #[default]
    #[serde(rename = "miracle_radius")]
    Miracle,
    #[serde(rename = "atomic_radius")]
    Atomic,
}

impl RadiusType {
    /// Key in the persisted table, e.g. `miracle_radius`
    pub fn key(&self) -> &'static str {
        match self {
            RadiusType::Miracle => "miracle_radius",
            RadiusType::Atomic => "atomic_radius",
        }
    }

    /// Prefix used in feature names, e.g. `miracle_atomic_packing_efficiency`
    pub fn prefix(&self) -> &'static str {
        match self {
            RadiusType::Miracle => "miracle",
            RadiusType::Atomic => "atomic",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RadiusRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miracle_radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atomic_radius: Option<f64>,
}

impl RadiusRecord {
    pub fn new(miracle_radius: f64, atomic_radius: f64) -> Self {
        Self {
            miracle_radius: Some(miracle_radius),
            atomic_radius: Some(atomic_radius),
        }
    }

    pub fn get(&self, radius_type: RadiusType) -> Option<f64> {
        match radius_type {
            RadiusType::Miracle => self.miracle_radius,
            RadiusType::Atomic => self.atomic_radius,
        }
    }
}

/// Atom type -> radii, keyed by stringified atomic number.
///
/// ```json
/// { "29": { "miracle_radius": 1.26, "atomic_radius": 1.28 } }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RadiusTable {
    entries: BTreeMap<String, RadiusRecord>,
}

impl RadiusTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, atom_type: u32, record: RadiusRecord) {
        self.entries.insert(atom_type.to_string(), record);
    }

    /// Builder-style insert, convenient for small hand-made tables.
    pub fn with(mut self, atom_type: u32, record: RadiusRecord) -> Self {
        self.insert(atom_type, record);
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a radius. A missing type or convention is a configuration
    /// error, never a silent default.
    pub fn radius(&self, atom_type: u32, radius_type: RadiusType) -> Result<f64> {
        self.entries
            .get(&atom_type.to_string())
            .and_then(|r| r.get(radius_type))
            .ok_or(SroError::MissingRadius {
                atom_type,
                radius_type: radius_type.key(),
            })
    }
}
