// src/model/topology.rs
// Neighbor-topology table produced by an external neighbor-list builder
// (Voronoi tessellation or distance cutoff). The engines only read it.

use crate::error::Result;
use crate::model::structure::Snapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Which neighbor-list algorithm produced a topology table.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Voronoi tessellation: carries facet edges, areas and sub-volumes.
    #[default]
    Voro,
    /// Distance cutoff: ids and distances only.
    Dist,
}

impl Provider {
    /// Suffix used in every column name, e.g. `CN voro`.
    pub fn tag(&self) -> &'static str {
        match self {
            Provider::Voro => "voro",
            Provider::Dist => "dist",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Column families of the topology table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyColumn {
    NeighborCount,
    NeighborId,
    NeighborEdge,
    NeighborArea,
    NeighborVolume,
    NeighborDistance,
}

/// One atom's row of the topology table.
///
/// The per-slot vectors are fixed-width (the neighbor limit) in the flat
/// column layout; only the first `n_neighbors` entries are meaningful.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NeighborRecord {
    pub n_neighbors: usize,
    #[serde(default)]
    pub ids: Vec<i64>,
    /// Edge count of the Voronoi facet shared with each neighbor
    #[serde(default)]
    pub edges: Vec<i32>,
    #[serde(default)]
    pub areas: Vec<f64>,
    /// Sub-polyhedron (pyramid) volume behind each facet
    #[serde(default)]
    pub volumes: Vec<f64>,
    #[serde(default)]
    pub distances: Vec<f64>,
}

impl NeighborRecord {
    /// Number of slots that may be read, bounded by the neighbor limit.
    pub fn valid_count(&self, limit: usize) -> usize {
        self.n_neighbors.min(limit)
    }

    fn valid<'a, T>(&self, values: &'a [T], limit: usize) -> &'a [T] {
        &values[..self.valid_count(limit).min(values.len())]
    }

    pub fn edges(&self, limit: usize) -> &[i32] {
        self.valid(&self.edges, limit)
    }

    pub fn areas(&self, limit: usize) -> &[f64] {
        self.valid(&self.areas, limit)
    }

    pub fn volumes(&self, limit: usize) -> &[f64] {
        self.valid(&self.volumes, limit)
    }

    pub fn distances(&self, limit: usize) -> &[f64] {
        self.valid(&self.distances, limit)
    }

    /// Neighbor ids within the valid slots; non-positive ids mark unused slots.
    pub fn neighbor_ids(&self, limit: usize) -> impl Iterator<Item = i64> + '_ {
        self.valid(&self.ids, limit)
            .iter()
            .copied()
            .filter(|&id| id > 0)
    }
}

fn default_dist_type() -> String {
    "distance".to_string()
}

fn default_columns() -> Vec<TopologyColumn> {
    vec![TopologyColumn::NeighborCount, TopologyColumn::NeighborId]
}

/// Row-aligned neighbor topology for one snapshot and one provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NeighborTopology {
    pub provider: Provider,
    pub neighbor_limit: usize,
    /// Name used in `neighbor_<dist_type>_<i>_<provider>` columns
    #[serde(default = "default_dist_type")]
    pub dist_type: String,
    /// Column families present in this table
    #[serde(default = "default_columns")]
    pub columns: Vec<TopologyColumn>,
    pub atom_ids: Vec<i64>,
    pub records: Vec<NeighborRecord>,
}

impl NeighborTopology {
    pub fn new(provider: Provider, neighbor_limit: usize, columns: &[TopologyColumn]) -> Self {
        Self {
            provider,
            neighbor_limit,
            dist_type: default_dist_type(),
            columns: columns.to_vec(),
            atom_ids: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Reads a JSON topology table.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn push(&mut self, atom_id: i64, record: NeighborRecord) {
        self.atom_ids.push(atom_id);
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has(&self, column: TopologyColumn) -> bool {
        self.columns.contains(&column)
    }

    /// Column name following the table grammar; `slot` is ignored for the
    /// neighbor count.
    pub fn column_name(&self, column: TopologyColumn, slot: usize) -> String {
        let p = self.provider.tag();
        match column {
            TopologyColumn::NeighborCount => format!("n_neighbors_{}", p),
            TopologyColumn::NeighborId => format!("neighbor_id_{}_{}", slot, p),
            TopologyColumn::NeighborEdge => format!("neighbor_edge_{}_{}", slot, p),
            TopologyColumn::NeighborArea => format!("neighbor_area_{}_{}", slot, p),
            TopologyColumn::NeighborVolume => format!("neighbor_vol_{}_{}", slot, p),
            TopologyColumn::NeighborDistance => {
                format!("neighbor_{}_{}_{}", self.dist_type, slot, p)
            }
        }
    }

    /// Names of the required column families this table lacks.
    ///
    /// A table from a different provider lacks everything.
    pub fn missing(&self, provider: Provider, required: &[TopologyColumn]) -> Vec<String> {
        required
            .iter()
            .filter(|&&c| provider != self.provider || !self.has(c))
            .map(|&c| match c {
                TopologyColumn::NeighborCount => format!("n_neighbors_{}", provider.tag()),
                TopologyColumn::NeighborId => format!("neighbor_id_*_{}", provider.tag()),
                TopologyColumn::NeighborEdge => format!("neighbor_edge_*_{}", provider.tag()),
                TopologyColumn::NeighborArea => format!("neighbor_area_*_{}", provider.tag()),
                TopologyColumn::NeighborVolume => format!("neighbor_vol_*_{}", provider.tag()),
                TopologyColumn::NeighborDistance => {
                    format!("neighbor_{}_*_{}", self.dist_type, provider.tag())
                }
            })
            .collect()
    }
}

/// External neighbor-list builder. The orchestrator only calls it when a
/// featurizer needs columns the current table does not have.
pub trait NeighborProvider: Send + Sync {
    fn provider(&self) -> Provider;

    fn build(&self, snapshot: &Snapshot, neighbor_limit: usize) -> Result<NeighborTopology>;
}
