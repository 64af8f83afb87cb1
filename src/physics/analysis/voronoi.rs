// src/physics/analysis/voronoi.rs
// Coordination number, Voronoi index, motif one-hot and i-fold symmetry.

use super::EdgeRange;
use crate::error::Result;
use crate::model::{FeatureTable, NeighborRecord, Provider, TopologyColumn};
use crate::pipeline::{finish, map_rows, FeatureContext, Featurizer};
use crate::utils::stats::NeumaierSum;

// --- 1. CONSTANTS ---

/// Icosahedral <0,0,12,0,0> and its Z16 defect <0,0,12,4,0>.
/// Entries count facets with 3, 4, 5, 6 and 7 edges.
pub const DEFAULT_MOTIFS: [[u32; 5]; 2] = [[0, 0, 12, 0, 0], [0, 0, 12, 4, 0]];

/// Edge count of the first entry of a motif target
const MOTIF_EDGE_MIN: usize = 3;
const MOTIF_EDGE_MAX: usize = 7;

// --- 2. COORDINATION NUMBER ---

#[derive(Clone, Copy, Debug, Default)]
pub struct Cn {
    pub provider: Provider,
}

impl Cn {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

impl Featurizer for Cn {
    fn label(&self) -> &'static str {
        "CN"
    }

    fn provider(&self) -> Provider {
        self.provider
    }

    fn required_columns(&self) -> Vec<TopologyColumn> {
        vec![TopologyColumn::NeighborCount]
    }

    fn feature_names(&self) -> Vec<String> {
        vec![format!("CN {}", self.provider)]
    }

    fn transform(&self, ctx: &FeatureContext, _prior: &FeatureTable) -> Result<FeatureTable> {
        let records = &ctx.topology.records;
        let rows = map_rows(records.len(), ctx.parallel, |i| {
            Ok(vec![records[i].n_neighbors as f64])
        })?;
        finish(ctx, self.feature_names(), rows)
    }
}

// --- 3. VORONOI INDEX ---

/// Facet counts per edge bin.
pub fn voronoi_index(record: &NeighborRecord, limit: usize, edges: &EdgeRange) -> Vec<f64> {
    let mut index = vec![0.0; edges.len()];
    for &edge in record.edges(limit) {
        if let Some(bin) = edges.bin(edge) {
            index[bin] += 1.0;
        }
    }
    index
}

#[derive(Clone, Copy, Debug, Default)]
pub struct VoronoiIndex {
    pub edges: EdgeRange,
}

impl VoronoiIndex {
    pub fn new(edges: EdgeRange) -> Self {
        Self { edges }
    }
}

impl Featurizer for VoronoiIndex {
    fn label(&self) -> &'static str {
        "Voronoi index"
    }

    fn provider(&self) -> Provider {
        Provider::Voro
    }

    fn required_columns(&self) -> Vec<TopologyColumn> {
        vec![TopologyColumn::NeighborCount, TopologyColumn::NeighborEdge]
    }

    fn feature_names(&self) -> Vec<String> {
        self.edges
            .edges()
            .map(|e| format!("Voronoi idx{} voro", e))
            .collect()
    }

    fn transform(&self, ctx: &FeatureContext, _prior: &FeatureTable) -> Result<FeatureTable> {
        let topology = ctx.topology;
        let rows = map_rows(topology.len(), ctx.parallel, |i| {
            Ok(voronoi_index(
                &topology.records[i],
                topology.neighbor_limit,
                &self.edges,
            ))
        })?;
        finish(ctx, self.feature_names(), rows)
    }
}

// --- 4. CHARACTER MOTIF ---

/// One-hot motif indicators read off the Voronoi index.
///
/// Output columns: one per target, then `is polytetrahedral` (OR of the
/// first two targets), then `is frank-kasper` when enabled.
#[derive(Clone, Debug)]
pub struct CharacterMotif {
    pub edges: EdgeRange,
    pub targets: Vec<[u32; 5]>,
    pub frank_kasper: bool,
}

impl Default for CharacterMotif {
    fn default() -> Self {
        Self {
            edges: EdgeRange::default(),
            targets: DEFAULT_MOTIFS.to_vec(),
            frank_kasper: true,
        }
    }
}

impl CharacterMotif {
    pub fn new(edges: EdgeRange, targets: Vec<[u32; 5]>, frank_kasper: bool) -> Self {
        Self {
            edges,
            targets,
            frank_kasper,
        }
    }

    /// Facets with `edge` edges in an index laid out over `self.edges`.
    fn count(&self, index: &[f64], edge: usize) -> f64 {
        if self.edges.edges().contains(&edge) {
            index.get(edge - self.edges.min).copied().unwrap_or(0.0)
        } else {
            0.0
        }
    }

    fn matches(&self, index: &[f64], target: &[u32; 5]) -> bool {
        let lo = self.edges.min.min(MOTIF_EDGE_MIN);
        let hi = self.edges.max.max(MOTIF_EDGE_MAX);
        (lo..=hi).all(|edge| {
            let expected = if (MOTIF_EDGE_MIN..=MOTIF_EDGE_MAX).contains(&edge) {
                target[edge - MOTIF_EDGE_MIN] as f64
            } else {
                0.0
            };
            self.count(index, edge) == expected
        })
    }

    /// No 3- or 4-edged facets and exactly twelve pentagons
    fn is_frank_kasper(&self, index: &[f64]) -> bool {
        self.count(index, 3) == 0.0 && self.count(index, 4) == 0.0 && self.count(index, 5) == 12.0
    }

    pub fn classify(&self, index: &[f64]) -> Vec<f64> {
        let hits: Vec<bool> = self.targets.iter().map(|t| self.matches(index, t)).collect();
        let polytetrahedral = hits.iter().take(2).any(|&h| h);

        let mut row: Vec<f64> = hits.iter().map(|&h| h as u8 as f64).collect();
        row.push(polytetrahedral as u8 as f64);
        if self.frank_kasper {
            row.push(self.is_frank_kasper(index) as u8 as f64);
        }
        row
    }
}

impl Featurizer for CharacterMotif {
    fn label(&self) -> &'static str {
        "character motif"
    }

    fn provider(&self) -> Provider {
        Provider::Voro
    }

    /// Edge columns are the prerequisite's concern; the motif only reads
    /// the index.
    fn required_columns(&self) -> Vec<TopologyColumn> {
        vec![TopologyColumn::NeighborCount]
    }

    fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .targets
            .iter()
            .map(|t| {
                let entries: Vec<String> = t.iter().map(|n| n.to_string()).collect();
                format!("is <{}> voro", entries.join(","))
            })
            .collect();
        names.push("is polytetrahedral voro".to_string());
        if self.frank_kasper {
            names.push("is frank-kasper voro".to_string());
        }
        names
    }

    fn prerequisite(&self) -> Option<Box<dyn Featurizer>> {
        Some(Box::new(VoronoiIndex::new(self.edges)))
    }

    fn transform(&self, ctx: &FeatureContext, prior: &FeatureTable) -> Result<FeatureTable> {
        let index_names = VoronoiIndex::new(self.edges).feature_names();

        // Reuse the index already in the table; compute it only when absent
        let index = match prior.select(&index_names) {
            Some(table) if table.n_rows() == ctx.topology.len() => table,
            _ => VoronoiIndex::new(self.edges).transform(ctx, prior)?,
        };

        let rows = map_rows(index.n_rows(), ctx.parallel, |i| Ok(self.classify(&index.rows[i])))?;
        finish(ctx, self.feature_names(), rows)
    }
}

// --- 5. I-FOLD SYMMETRY ---

/// Share of facet weight per edge bin.
///
/// `weights = None` counts facets. The denominator is the total weight over
/// every valid facet, so dropped facets still count; a zero total gives a
/// zero row.
pub fn i_fold_symmetry(
    record: &NeighborRecord,
    limit: usize,
    edges: &EdgeRange,
    weights: Option<&[f64]>,
) -> Vec<f64> {
    let facet_edges = record.edges(limit);
    let weight = |k: usize| match weights {
        Some(w) => w.get(k).copied().unwrap_or(0.0),
        None => 1.0,
    };

    let mut bins = vec![NeumaierSum::new(); edges.len()];
    let mut total = NeumaierSum::new();
    for (k, &edge) in facet_edges.iter().enumerate() {
        let w = weight(k);
        total += w;
        if let Some(bin) = edges.bin(edge) {
            bins[bin] += w;
        }
    }

    let total = total.value();
    if total == 0.0 {
        return vec![0.0; edges.len()];
    }
    bins.iter().map(|b| b.value() / total).collect()
}

/// Which per-facet weight an i-fold symmetry featurizer uses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FoldWeight {
    Count,
    Area,
    Volume,
}

fn fold_transform(
    ctx: &FeatureContext,
    edges: &EdgeRange,
    weight: FoldWeight,
    names: Vec<String>,
) -> Result<FeatureTable> {
    let topology = ctx.topology;
    let limit = topology.neighbor_limit;
    let rows = map_rows(topology.len(), ctx.parallel, |i| {
        let record = &topology.records[i];
        let weights = match weight {
            FoldWeight::Count => None,
            FoldWeight::Area => Some(record.areas(limit)),
            FoldWeight::Volume => Some(record.volumes(limit)),
        };
        Ok(i_fold_symmetry(record, limit, edges, weights))
    })?;
    finish(ctx, names, rows)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct IFoldSymmetry {
    pub edges: EdgeRange,
}

impl IFoldSymmetry {
    pub fn new(edges: EdgeRange) -> Self {
        Self { edges }
    }
}

impl Featurizer for IFoldSymmetry {
    fn label(&self) -> &'static str {
        "i-fold symmetry"
    }

    fn provider(&self) -> Provider {
        Provider::Voro
    }

    fn required_columns(&self) -> Vec<TopologyColumn> {
        vec![TopologyColumn::NeighborCount, TopologyColumn::NeighborEdge]
    }

    fn feature_names(&self) -> Vec<String> {
        self.edges
            .edges()
            .map(|e| format!("{}-fold symm idx voro", e))
            .collect()
    }

    fn transform(&self, ctx: &FeatureContext, _prior: &FeatureTable) -> Result<FeatureTable> {
        fold_transform(ctx, &self.edges, FoldWeight::Count, self.feature_names())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AreaWtIFoldSymmetry {
    pub edges: EdgeRange,
}

impl AreaWtIFoldSymmetry {
    pub fn new(edges: EdgeRange) -> Self {
        Self { edges }
    }
}

impl Featurizer for AreaWtIFoldSymmetry {
    fn label(&self) -> &'static str {
        "area-weighted i-fold symmetry"
    }

    fn provider(&self) -> Provider {
        Provider::Voro
    }

    fn required_columns(&self) -> Vec<TopologyColumn> {
        vec![
            TopologyColumn::NeighborCount,
            TopologyColumn::NeighborEdge,
            TopologyColumn::NeighborArea,
        ]
    }

    fn feature_names(&self) -> Vec<String> {
        self.edges
            .edges()
            .map(|e| format!("Area_wt {}-fold symm idx voro", e))
            .collect()
    }

    fn transform(&self, ctx: &FeatureContext, _prior: &FeatureTable) -> Result<FeatureTable> {
        fold_transform(ctx, &self.edges, FoldWeight::Area, self.feature_names())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct VolWtIFoldSymmetry {
    pub edges: EdgeRange,
}

impl VolWtIFoldSymmetry {
    pub fn new(edges: EdgeRange) -> Self {
        Self { edges }
    }
}

impl Featurizer for VolWtIFoldSymmetry {
    fn label(&self) -> &'static str {
        "volume-weighted i-fold symmetry"
    }

    fn provider(&self) -> Provider {
        Provider::Voro
    }

    fn required_columns(&self) -> Vec<TopologyColumn> {
        vec![
            TopologyColumn::NeighborCount,
            TopologyColumn::NeighborEdge,
            TopologyColumn::NeighborVolume,
        ]
    }

    fn feature_names(&self) -> Vec<String> {
        self.edges
            .edges()
            .map(|e| format!("Vol_wt {}-fold symm idx voro", e))
            .collect()
    }

    fn transform(&self, ctx: &FeatureContext, _prior: &FeatureTable) -> Result<FeatureTable> {
        fold_transform(ctx, &self.edges, FoldWeight::Volume, self.feature_names())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NeighborTopology;
    use crate::pipeline::Pipeline;

    fn record(edges: &[i32], areas: &[f64]) -> NeighborRecord {
        NeighborRecord {
            n_neighbors: edges.len(),
            ids: (1..=edges.len() as i64).collect(),
            edges: edges.to_vec(),
            areas: areas.to_vec(),
            volumes: areas.iter().map(|a| a * 2.0).collect(),
            distances: Vec::new(),
        }
    }

    fn topology(records: Vec<NeighborRecord>) -> NeighborTopology {
        let mut topo = NeighborTopology::new(
            Provider::Voro,
            80,
            &[
                TopologyColumn::NeighborCount,
                TopologyColumn::NeighborId,
                TopologyColumn::NeighborEdge,
                TopologyColumn::NeighborArea,
                TopologyColumn::NeighborVolume,
            ],
        );
        for (i, r) in records.into_iter().enumerate() {
            topo.push(i as i64 + 1, r);
        }
        topo
    }

    fn icosahedral() -> NeighborRecord {
        record(&[5; 12], &[1.0; 12])
    }

    #[test]
    fn test_index_sums_to_facet_count() {
        let r = record(&[3, 4, 5, 5, 6, 8, 9], &[]);
        let index = voronoi_index(&r, 80, &EdgeRange::default());
        assert_eq!(index, vec![1.0, 1.0, 2.0, 1.0, 2.0]);
        assert_eq!(index.iter().sum::<f64>(), 7.0);

        let strict = voronoi_index(&r, 80, &EdgeRange::new(3, 7, false));
        assert_eq!(strict.iter().sum::<f64>(), 5.0);
    }

    #[test]
    fn test_motif_one_hot() {
        let motif = CharacterMotif::default();
        assert_eq!(motif.classify(&[0.0, 0.0, 12.0, 0.0, 0.0]), vec![1.0, 0.0, 1.0, 1.0]);
        assert_eq!(motif.classify(&[0.0, 0.0, 12.0, 4.0, 0.0]), vec![0.0, 1.0, 1.0, 1.0]);
        assert_eq!(motif.classify(&[0.0, 2.0, 8.0, 4.0, 0.0]), vec![0.0; 4]);
    }

    #[test]
    fn test_motif_wider_edge_range_must_be_empty_outside_target() {
        let motif = CharacterMotif::new(EdgeRange::new(3, 8, false), DEFAULT_MOTIFS.to_vec(), false);
        assert_eq!(motif.classify(&[0.0, 0.0, 12.0, 0.0, 0.0, 0.0]), vec![1.0, 0.0, 1.0]);
        assert_eq!(motif.classify(&[0.0, 0.0, 12.0, 0.0, 0.0, 1.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_motif_feature_names() {
        let names = CharacterMotif::default().feature_names();
        assert_eq!(
            names,
            vec![
                "is <0,0,12,0,0> voro",
                "is <0,0,12,4,0> voro",
                "is polytetrahedral voro",
                "is frank-kasper voro",
            ]
        );
    }

    #[test]
    fn test_motif_reuses_index_columns() {
        // The topology says nothing is icosahedral, the prior index says the
        // atom is; the prior columns must win.
        let topo = topology(vec![record(&[4, 4, 4, 4], &[1.0; 4])]);
        let ctx = FeatureContext::new(&topo);
        let index_names = VoronoiIndex::default().feature_names();
        let prior =
            FeatureTable::new(vec![1], index_names, vec![vec![0.0, 0.0, 12.0, 0.0, 0.0]]).unwrap();

        let out = CharacterMotif::default().transform(&ctx, &prior).unwrap();
        assert_eq!(out.rows[0][0], 1.0);

        let fresh = CharacterMotif::default()
            .transform(&ctx, &FeatureTable::empty(vec![1]))
            .unwrap();
        assert_eq!(fresh.rows[0][0], 0.0);
    }

    /// Emits a fixed icosahedral index without reading any edge column.
    struct FixedIndex;

    impl Featurizer for FixedIndex {
        fn label(&self) -> &'static str {
            "fixed index"
        }
        fn provider(&self) -> Provider {
            Provider::Voro
        }
        fn required_columns(&self) -> Vec<TopologyColumn> {
            vec![TopologyColumn::NeighborCount]
        }
        fn feature_names(&self) -> Vec<String> {
            VoronoiIndex::default().feature_names()
        }
        fn transform(&self, ctx: &FeatureContext, _prior: &FeatureTable) -> Result<FeatureTable> {
            let rows = vec![vec![0.0, 0.0, 12.0, 0.0, 0.0]; ctx.topology.len()];
            finish(ctx, self.feature_names(), rows)
        }
    }

    #[test]
    fn test_motif_runs_on_index_without_edge_columns() {
        let mut topo = NeighborTopology::new(Provider::Voro, 80, &[TopologyColumn::NeighborCount]);
        topo.push(1, NeighborRecord::default());
        let mut pipeline = Pipeline::new(80).with_topology(topo);

        let featurizers: Vec<Box<dyn Featurizer>> =
            vec![Box::new(FixedIndex), Box::new(CharacterMotif::default())];
        let table = pipeline.run(&featurizers).unwrap();
        assert_eq!(table.column("is <0,0,12,0,0> voro").unwrap(), vec![1.0]);
        assert_eq!(table.column("is polytetrahedral voro").unwrap(), vec![1.0]);
    }

    #[test]
    fn test_motif_alone_emits_only_its_columns() {
        let topo = topology(vec![icosahedral(), record(&[4, 4, 5, 6], &[1.0; 4])]);
        let mut pipeline = Pipeline::new(80).with_topology(topo);
        let motif = CharacterMotif::default();
        let featurizers: Vec<Box<dyn Featurizer>> = vec![Box::new(motif.clone())];

        let table = pipeline.run(&featurizers).unwrap();
        assert_eq!(table.columns, motif.feature_names());
        assert_eq!(table.rows[0], vec![1.0, 0.0, 1.0, 1.0]);
        assert_eq!(table.rows[1], vec![0.0; 4]);
    }

    #[test]
    fn test_i_fold_fractions_sum_to_one() {
        let topo = topology(vec![record(&[3, 4, 5, 5, 6, 7], &[1.0, 2.0, 1.0, 1.0, 3.0, 2.0])]);
        let ctx = FeatureContext::new(&topo).sequential();
        let edges = EdgeRange::new(3, 7, false);

        let plain = IFoldSymmetry::new(edges)
            .transform(&ctx, &FeatureTable::empty(vec![1]))
            .unwrap();
        assert!((plain.rows[0].iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((plain.rows[0][2] - 2.0 / 6.0).abs() < 1e-12);

        let area = AreaWtIFoldSymmetry::new(edges)
            .transform(&ctx, &FeatureTable::empty(vec![1]))
            .unwrap();
        assert!((area.rows[0][3] - 0.3).abs() < 1e-12);

        let vol = VolWtIFoldSymmetry::new(edges)
            .transform(&ctx, &FeatureTable::empty(vec![1]))
            .unwrap();
        assert_eq!(area.rows, vol.rows);
    }

    #[test]
    fn test_empty_shell_gives_zero_rows() {
        let topo = topology(vec![NeighborRecord::default(), icosahedral()]);
        let ctx = FeatureContext::new(&topo);
        let out = IFoldSymmetry::default()
            .transform(&ctx, &FeatureTable::empty(vec![1, 2]))
            .unwrap();
        assert_eq!(out.rows[0], vec![0.0; 5]);
        assert_eq!(out.rows[1], vec![0.0, 0.0, 1.0, 0.0, 0.0]);

        let cn = Cn::new(Provider::Voro)
            .transform(&ctx, &FeatureTable::empty(vec![1, 2]))
            .unwrap();
        assert_eq!(cn.columns, vec!["CN voro"]);
        assert_eq!(cn.column("CN voro").unwrap(), vec![0.0, 12.0]);
    }
}
