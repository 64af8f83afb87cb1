// src/physics/analysis/facet_stats.rs
// Five-number summaries of per-facet areas, sub-polyhedron volumes and
// neighbor distances, whole-shell or split by facet edge count.

use super::EdgeRange;
use crate::error::{Result, SroError};
use crate::model::{FeatureTable, NeighborRecord, Provider, TopologyColumn};
use crate::pipeline::{finish, map_rows, FeatureContext, Featurizer};
use crate::utils::stats::{calc_stats, STAT_NAMES};

/// Stats of `values` split by the edge bin of each facet, edge-major:
/// `[e0 sum, e0 mean, ..., e1 sum, ...]`.
pub fn separate_stats(facet_edges: &[i32], values: &[f64], edges: &EdgeRange) -> Vec<f64> {
    let mut groups: Vec<Vec<f64>> = vec![Vec::new(); edges.len()];
    for (&edge, &value) in facet_edges.iter().zip(values) {
        if let Some(bin) = edges.bin(edge) {
            groups[bin].push(value);
        }
    }
    groups.iter().flat_map(|g| calc_stats(g)).collect()
}

/// Which per-slot column a stats featurizer reads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Quantity {
    Area,
    Volume,
}

impl Quantity {
    fn values(self, record: &NeighborRecord, limit: usize) -> &[f64] {
        match self {
            Quantity::Area => record.areas(limit),
            Quantity::Volume => record.volumes(limit),
        }
    }

    fn column(self) -> TopologyColumn {
        match self {
            Quantity::Area => TopologyColumn::NeighborArea,
            Quantity::Volume => TopologyColumn::NeighborVolume,
        }
    }
}

fn shell_transform(
    ctx: &FeatureContext,
    quantity: Quantity,
    names: Vec<String>,
) -> Result<FeatureTable> {
    let topology = ctx.topology;
    let limit = topology.neighbor_limit;
    let rows = map_rows(topology.len(), ctx.parallel, |i| {
        Ok(calc_stats(quantity.values(&topology.records[i], limit)).to_vec())
    })?;
    finish(ctx, names, rows)
}

fn separate_transform(
    ctx: &FeatureContext,
    quantity: Quantity,
    edges: &EdgeRange,
    names: Vec<String>,
) -> Result<FeatureTable> {
    let topology = ctx.topology;
    let limit = topology.neighbor_limit;
    let rows = map_rows(topology.len(), ctx.parallel, |i| {
        let record = &topology.records[i];
        Ok(separate_stats(
            record.edges(limit),
            quantity.values(record, limit),
            edges,
        ))
    })?;
    finish(ctx, names, rows)
}

fn separate_names(edges: &EdgeRange, what: &str) -> Vec<String> {
    edges
        .edges()
        .flat_map(|e| {
            STAT_NAMES
                .iter()
                .map(move |stat| format!("{}-edged {} {} voro", e, what, stat))
        })
        .collect()
}

// --- AREA ---

/// Total Voronoi cell area and per-facet area statistics
#[derive(Clone, Copy, Debug, Default)]
pub struct VoroAreaStats;

impl Featurizer for VoroAreaStats {
    fn label(&self) -> &'static str {
        "Voronoi area stats"
    }

    fn provider(&self) -> Provider {
        Provider::Voro
    }

    fn required_columns(&self) -> Vec<TopologyColumn> {
        vec![TopologyColumn::NeighborCount, Quantity::Area.column()]
    }

    fn feature_names(&self) -> Vec<String> {
        std::iter::once("Voronoi area voro".to_string())
            .chain(STAT_NAMES[1..].iter().map(|s| format!("Facet area {} voro", s)))
            .collect()
    }

    fn transform(&self, ctx: &FeatureContext, _prior: &FeatureTable) -> Result<FeatureTable> {
        shell_transform(ctx, Quantity::Area, self.feature_names())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct VoroAreaStatsSeparate {
    pub edges: EdgeRange,
}

impl VoroAreaStatsSeparate {
    pub fn new(edges: EdgeRange) -> Self {
        Self { edges }
    }
}

impl Featurizer for VoroAreaStatsSeparate {
    fn label(&self) -> &'static str {
        "Voronoi area stats by edge"
    }

    fn provider(&self) -> Provider {
        Provider::Voro
    }

    fn required_columns(&self) -> Vec<TopologyColumn> {
        vec![
            TopologyColumn::NeighborCount,
            TopologyColumn::NeighborEdge,
            Quantity::Area.column(),
        ]
    }

    fn feature_names(&self) -> Vec<String> {
        separate_names(&self.edges, "area")
    }

    fn transform(&self, ctx: &FeatureContext, _prior: &FeatureTable) -> Result<FeatureTable> {
        separate_transform(ctx, Quantity::Area, &self.edges, self.feature_names())
    }
}

// --- VOLUME ---

/// Total Voronoi cell volume and sub-polyhedron volume statistics
#[derive(Clone, Copy, Debug, Default)]
pub struct VoroVolStats;

impl Featurizer for VoroVolStats {
    fn label(&self) -> &'static str {
        "Voronoi volume stats"
    }

    fn provider(&self) -> Provider {
        Provider::Voro
    }

    fn required_columns(&self) -> Vec<TopologyColumn> {
        vec![TopologyColumn::NeighborCount, Quantity::Volume.column()]
    }

    fn feature_names(&self) -> Vec<String> {
        std::iter::once("Voronoi vol voro".to_string())
            .chain(
                STAT_NAMES[1..]
                    .iter()
                    .map(|s| format!("Sub-polyhedra vol {} voro", s)),
            )
            .collect()
    }

    fn transform(&self, ctx: &FeatureContext, _prior: &FeatureTable) -> Result<FeatureTable> {
        shell_transform(ctx, Quantity::Volume, self.feature_names())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct VoroVolStatsSeparate {
    pub edges: EdgeRange,
}

impl VoroVolStatsSeparate {
    pub fn new(edges: EdgeRange) -> Self {
        Self { edges }
    }
}

impl Featurizer for VoroVolStatsSeparate {
    fn label(&self) -> &'static str {
        "Voronoi volume stats by edge"
    }

    fn provider(&self) -> Provider {
        Provider::Voro
    }

    fn required_columns(&self) -> Vec<TopologyColumn> {
        vec![
            TopologyColumn::NeighborCount,
            TopologyColumn::NeighborEdge,
            Quantity::Volume.column(),
        ]
    }

    fn feature_names(&self) -> Vec<String> {
        separate_names(&self.edges, "vol")
    }

    fn transform(&self, ctx: &FeatureContext, _prior: &FeatureTable) -> Result<FeatureTable> {
        separate_transform(ctx, Quantity::Volume, &self.edges, self.feature_names())
    }
}

// --- DISTANCE ---

/// Neighbor distance statistics for either provider.
///
/// `dist_type` names the distance column family (`distance` by default) and
/// must match the topology it runs on.
#[derive(Clone, Debug)]
pub struct DistStats {
    pub provider: Provider,
    pub dist_type: String,
}

impl Default for DistStats {
    fn default() -> Self {
        Self::new(Provider::Voro, "distance")
    }
}

impl DistStats {
    pub fn new(provider: Provider, dist_type: impl Into<String>) -> Self {
        Self {
            provider,
            dist_type: dist_type.into(),
        }
    }
}

impl Featurizer for DistStats {
    fn label(&self) -> &'static str {
        "distance stats"
    }

    fn provider(&self) -> Provider {
        self.provider
    }

    fn required_columns(&self) -> Vec<TopologyColumn> {
        vec![TopologyColumn::NeighborCount, TopologyColumn::NeighborDistance]
    }

    fn feature_names(&self) -> Vec<String> {
        STAT_NAMES
            .iter()
            .map(|s| format!("{} {} {}", self.dist_type, s, self.provider))
            .collect()
    }

    fn transform(&self, ctx: &FeatureContext, _prior: &FeatureTable) -> Result<FeatureTable> {
        let topology = ctx.topology;
        if topology.dist_type != self.dist_type {
            return Err(SroError::missing_columns(
                self.label(),
                vec![format!("neighbor_{}_*_{}", self.dist_type, self.provider)],
            ));
        }
        let limit = topology.neighbor_limit;
        let rows = map_rows(topology.len(), ctx.parallel, |i| {
            Ok(calc_stats(topology.records[i].distances(limit)).to_vec())
        })?;
        finish(ctx, self.feature_names(), rows)
    }
}
