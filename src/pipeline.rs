// src/pipeline.rs
// Featurizer contract and the orchestrator that resolves topology columns,
// feature prerequisites and the final merge.

use crate::error::{Result, SroError};
use crate::model::{
    FeatureTable, NeighborProvider, NeighborTopology, Provider, RadiusTable, Snapshot,
    TopologyColumn,
};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

// --- 1. FEATURIZER CONTRACT ---

/// Read-only inputs shared by every row of one featurizer run.
#[derive(Clone, Copy)]
pub struct FeatureContext<'a> {
    pub snapshot: Option<&'a Snapshot>,
    pub topology: &'a NeighborTopology,
    pub radii: Option<&'a RadiusTable>,
    pub parallel: bool,
}

impl<'a> FeatureContext<'a> {
    pub fn new(topology: &'a NeighborTopology) -> Self {
        Self {
            snapshot: None,
            topology,
            radii: None,
            parallel: true,
        }
    }

    pub fn with_snapshot(mut self, snapshot: &'a Snapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn with_radii(mut self, radii: &'a RadiusTable) -> Self {
        self.radii = Some(radii);
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn snapshot(&self) -> Result<&'a Snapshot> {
        self.snapshot
            .ok_or(SroError::MissingGeometry("atom coordinates and box bounds"))
    }

    pub fn radii(&self) -> Result<&'a RadiusTable> {
        self.radii.ok_or(SroError::MissingGeometry("radius table"))
    }
}

/// One family of per-atom descriptors.
///
/// `feature_names` fixes the output width and column order; every row a
/// featurizer emits has exactly that many values.
pub trait Featurizer: Send + Sync {
    /// Short name used in logs and errors
    fn label(&self) -> &'static str;

    fn provider(&self) -> Provider;

    /// Topology column families read by `transform`
    fn required_columns(&self) -> Vec<TopologyColumn>;

    fn feature_names(&self) -> Vec<String>;

    /// Featurizer whose columns this one reads from the accumulated table
    fn prerequisite(&self) -> Option<Box<dyn Featurizer>> {
        None
    }

    /// `prior` holds the features computed earlier in the same run.
    fn transform(&self, ctx: &FeatureContext, prior: &FeatureTable) -> Result<FeatureTable>;
}

// --- 2. ROW MAPPING ---

/// Computes one row per topology record, in parallel when asked.
///
/// Output order is the input order regardless of scheduling. When several
/// rows fail, the error of the lowest row index wins.
pub fn map_rows<T, F>(n_rows: usize, parallel: bool, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Send + Sync,
{
    let results: Vec<Result<T>> = if parallel {
        (0..n_rows).into_par_iter().map(&f).collect()
    } else {
        (0..n_rows).map(&f).collect()
    };
    results.into_iter().collect()
}

/// Wraps computed rows into a table aligned to the context's topology.
pub fn finish(ctx: &FeatureContext, names: Vec<String>, rows: Vec<Vec<f64>>) -> Result<FeatureTable> {
    FeatureTable::new(ctx.topology.atom_ids.clone(), names, rows)
}

// --- 3. ORCHESTRATOR ---

/// Runs a list of featurizers over one snapshot.
///
/// Topologies are kept per provider. When a featurizer needs columns that no
/// table has, the registered [`NeighborProvider`] for its provider is called
/// once and the result memoized for the rest of the run.
pub struct Pipeline {
    snapshot: Option<Snapshot>,
    radii: Option<RadiusTable>,
    topologies: BTreeMap<Provider, NeighborTopology>,
    providers: Vec<Box<dyn NeighborProvider>>,
    type_mapping: Option<Vec<u32>>,
    neighbor_limit: usize,
    parallel: bool,
    remain_topology: bool,
}

impl Pipeline {
    pub fn new(neighbor_limit: usize) -> Self {
        Self {
            snapshot: None,
            radii: None,
            topologies: BTreeMap::new(),
            providers: Vec::new(),
            type_mapping: None,
            neighbor_limit,
            parallel: true,
            remain_topology: false,
        }
    }

    pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn with_radii(mut self, radii: RadiusTable) -> Self {
        self.radii = Some(radii);
        self
    }

    pub fn with_topology(mut self, topology: NeighborTopology) -> Self {
        self.topologies.insert(topology.provider, topology);
        self
    }

    pub fn with_provider(mut self, provider: Box<dyn NeighborProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// 1-based local type -> atomic number, applied once before the first
    /// featurizer runs.
    pub fn with_type_mapping(mut self, mapping: Vec<u32>) -> Self {
        self.type_mapping = Some(mapping);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Start the output from the rendered topology columns.
    pub fn remain_topology(mut self, remain: bool) -> Self {
        self.remain_topology = remain;
        self
    }

    pub fn topology(&self, provider: Provider) -> Option<&NeighborTopology> {
        self.topologies.get(&provider)
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Runs `featurizers` in order and merges their columns.
    ///
    /// Only the listed featurizers add columns. Prerequisites computed along
    /// the way are kept for the rest of the run and handed to dependents as
    /// `prior`, but never emitted.
    pub fn run(&mut self, featurizers: &[Box<dyn Featurizer>]) -> Result<FeatureTable> {
        self.apply_type_mapping()?;

        let mut master: Option<FeatureTable> = None;
        let mut rendered = BTreeSet::new();
        let mut memo = Memo::new();
        for featurizer in featurizers {
            let names = featurizer.feature_names();
            let result = match memo.remove(&names) {
                Some(table) => {
                    debug!("Reusing computed {} columns", featurizer.label());
                    table
                }
                None => self.compute(featurizer.as_ref(), &mut master, &mut rendered, &mut memo)?,
            };
            master
                .get_or_insert_with(|| FeatureTable::empty(result.ids.clone()))
                .merge(&result)?;
        }

        Ok(master.unwrap_or_default())
    }

    fn apply_type_mapping(&mut self) -> Result<()> {
        if let Some(mapping) = self.type_mapping.take() {
            if let Some(snapshot) = self.snapshot.take() {
                self.snapshot = Some(snapshot.with_type_mapping(&mapping)?);
                debug!("Remapped atom types through {} entries", mapping.len());
            }
        }
        Ok(())
    }

    /// Computes one featurizer's table without merging it.
    fn compute(
        &mut self,
        featurizer: &dyn Featurizer,
        master: &mut Option<FeatureTable>,
        rendered: &mut BTreeSet<Provider>,
        memo: &mut Memo,
    ) -> Result<FeatureTable> {
        let provider = featurizer.provider();
        self.ensure_topology(featurizer)?;

        let topology = self
            .topologies
            .get(&provider)
            .ok_or_else(|| SroError::missing_columns(featurizer.label(), Vec::new()))?;

        let table = master.get_or_insert_with(|| FeatureTable::empty(topology.atom_ids.clone()));
        if self.remain_topology && rendered.insert(provider) {
            table.merge(&FeatureTable::from_topology(topology))?;
        }

        if let Some(prerequisite) = featurizer.prerequisite() {
            let names = prerequisite.feature_names();
            if table.has_columns(&names) || memo.contains_key(&names) {
                debug!(
                    "Reusing {} columns for {}",
                    prerequisite.label(),
                    featurizer.label()
                );
            } else {
                let computed = self.compute(prerequisite.as_ref(), master, rendered, memo)?;
                memo.insert(names, computed);
            }
        }

        let topology = self
            .topologies
            .get(&provider)
            .ok_or_else(|| SroError::missing_columns(featurizer.label(), Vec::new()))?;
        let ctx = FeatureContext {
            snapshot: self.snapshot.as_ref(),
            topology,
            radii: self.radii.as_ref(),
            parallel: self.parallel,
        };

        let emitted = master.get_or_insert_with(|| FeatureTable::empty(topology.atom_ids.clone()));
        let scratch;
        let prior = if memo.is_empty() {
            &*emitted
        } else {
            let mut view = emitted.clone();
            // Tables from another provider's topology do not line up
            let ids = view.ids.clone();
            for table in memo.values().filter(|t| t.ids == ids) {
                view.merge(table)?;
            }
            scratch = view;
            &scratch
        };

        let result = featurizer.transform(&ctx, prior)?;
        info!(
            "Computed {} {}: {} rows x {} columns",
            featurizer.label(),
            provider,
            result.n_rows(),
            result.n_columns()
        );
        Ok(result)
    }

    /// Makes sure the topology for the featurizer's provider carries its
    /// required columns, calling a registered provider when it does not.
    fn ensure_topology(&mut self, featurizer: &dyn Featurizer) -> Result<()> {
        let provider = featurizer.provider();
        let required = featurizer.required_columns();

        let missing = match self.topologies.get(&provider) {
            Some(topology) => topology.missing(provider, &required),
            None => absent_columns(provider, &required),
        };
        if missing.is_empty() {
            return Ok(());
        }

        let builder = self
            .providers
            .iter()
            .find(|p| p.provider() == provider)
            .ok_or_else(|| SroError::missing_columns(featurizer.label(), missing.clone()))?;
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or(SroError::MissingGeometry("snapshot for neighbor construction"))?;

        warn!(
            "{} needs {}; building {} neighbor topology",
            featurizer.label(),
            missing.join(", "),
            provider
        );
        let topology = builder.build(snapshot, self.neighbor_limit)?;

        let still_missing = topology.missing(provider, &required);
        if !still_missing.is_empty() {
            return Err(SroError::missing_columns(featurizer.label(), still_missing));
        }
        self.topologies.insert(provider, topology);
        Ok(())
    }
}

/// Prerequisite tables computed during one run, keyed by their column names
type Memo = BTreeMap<Vec<String>, FeatureTable>;

/// Column names for a provider with no table at all.
fn absent_columns(provider: Provider, required: &[TopologyColumn]) -> Vec<String> {
    NeighborTopology::new(provider, 0, &[]).missing(provider, required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Atom, NeighborRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Emits the neighbor count and counts its own invocations.
    struct Counting {
        calls: Arc<AtomicUsize>,
        name: &'static str,
        needs: Option<&'static str>,
    }

    impl Featurizer for Counting {
        fn label(&self) -> &'static str {
            self.name
        }
        fn provider(&self) -> Provider {
            Provider::Voro
        }
        fn required_columns(&self) -> Vec<TopologyColumn> {
            vec![TopologyColumn::NeighborCount]
        }
        fn feature_names(&self) -> Vec<String> {
            vec![format!("{} voro", self.name)]
        }
        fn prerequisite(&self) -> Option<Box<dyn Featurizer>> {
            self.needs.map(|name| {
                Box::new(Counting {
                    calls: Arc::clone(&self.calls),
                    name,
                    needs: None,
                }) as Box<dyn Featurizer>
            })
        }
        fn transform(&self, ctx: &FeatureContext, _prior: &FeatureTable) -> Result<FeatureTable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let records = &ctx.topology.records;
            let rows = map_rows(records.len(), ctx.parallel, |i| {
                Ok(vec![records[i].n_neighbors as f64])
            })?;
            finish(ctx, self.feature_names(), rows)
        }
    }

    struct FixedProvider {
        calls: Arc<AtomicUsize>,
    }

    impl NeighborProvider for FixedProvider {
        fn provider(&self) -> Provider {
            Provider::Voro
        }
        fn build(&self, snapshot: &Snapshot, neighbor_limit: usize) -> Result<NeighborTopology> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut topo = NeighborTopology::new(
                Provider::Voro,
                neighbor_limit,
                &[TopologyColumn::NeighborCount, TopologyColumn::NeighborId],
            );
            for atom in &snapshot.atoms {
                topo.push(
                    atom.id,
                    NeighborRecord {
                        n_neighbors: 2,
                        ..Default::default()
                    },
                );
            }
            Ok(topo)
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot::new(
            vec![Atom::new(1, 1, [0.0; 3]), Atom::new(2, 1, [1.0, 0.0, 0.0])],
            [[0.0, 5.0]; 3],
            [true; 3],
        )
    }

    #[test]
    fn test_map_rows_keeps_order_and_first_error() {
        let rows = map_rows(100, true, |i| Ok(vec![i as f64])).unwrap();
        assert!(rows.iter().enumerate().all(|(i, r)| r[0] == i as f64));

        let err = map_rows(50, true, |i| {
            if i >= 10 {
                Err(SroError::UnsupportedCoordination(i))
            } else {
                Ok(vec![0.0])
            }
        })
        .unwrap_err();
        assert!(matches!(err, SroError::UnsupportedCoordination(10)));
    }

    #[test]
    fn test_provider_invoked_once_when_columns_missing() {
        let built = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = Pipeline::new(4)
            .with_snapshot(snapshot())
            .with_provider(Box::new(FixedProvider {
                calls: Arc::clone(&built),
            }));

        let featurizers: Vec<Box<dyn Featurizer>> = vec![
            Box::new(Counting {
                calls: Arc::clone(&calls),
                name: "a",
                needs: None,
            }),
            Box::new(Counting {
                calls: Arc::clone(&calls),
                name: "b",
                needs: None,
            }),
        ];
        let table = pipeline.run(&featurizers).unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(table.columns, vec!["a voro", "b voro"]);
        assert_eq!(table.column("b voro").unwrap(), vec![2.0, 2.0]);
    }

    #[test]
    fn test_missing_columns_without_provider() {
        let mut pipeline = Pipeline::new(4).with_snapshot(snapshot());
        let featurizers: Vec<Box<dyn Featurizer>> = vec![Box::new(Counting {
            calls: Arc::new(AtomicUsize::new(0)),
            name: "a",
            needs: None,
        })];
        assert!(matches!(
            pipeline.run(&featurizers),
            Err(SroError::MissingColumns { .. })
        ));
    }

    #[test]
    fn test_prerequisite_computed_once_and_reused() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut topo = NeighborTopology::new(Provider::Voro, 4, &[TopologyColumn::NeighborCount]);
        topo.push(1, NeighborRecord::default());

        let mut pipeline = Pipeline::new(4).with_topology(topo);
        let featurizers: Vec<Box<dyn Featurizer>> = vec![
            Box::new(Counting {
                calls: Arc::clone(&calls),
                name: "motif",
                needs: Some("index"),
            }),
            Box::new(Counting {
                calls: Arc::clone(&calls),
                name: "symm",
                needs: Some("index"),
            }),
        ];
        let table = pipeline.run(&featurizers).unwrap();

        // index once, motif once, symm once; index is not emitted
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(table.columns, vec!["motif voro", "symm voro"]);
    }

    #[test]
    fn test_listed_prerequisite_reuses_memoized_table() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut topo = NeighborTopology::new(Provider::Voro, 4, &[TopologyColumn::NeighborCount]);
        topo.push(1, NeighborRecord::default());

        let mut pipeline = Pipeline::new(4).with_topology(topo);
        let featurizers: Vec<Box<dyn Featurizer>> = vec![
            Box::new(Counting {
                calls: Arc::clone(&calls),
                name: "motif",
                needs: Some("index"),
            }),
            Box::new(Counting {
                calls: Arc::clone(&calls),
                name: "index",
                needs: None,
            }),
        ];
        let table = pipeline.run(&featurizers).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(table.columns, vec!["motif voro", "index voro"]);
    }

    #[test]
    fn test_remain_topology_prepends_input_columns() {
        let mut topo = NeighborTopology::new(Provider::Voro, 1, &[TopologyColumn::NeighborCount]);
        topo.push(1, NeighborRecord {
            n_neighbors: 3,
            ..Default::default()
        });
        let mut pipeline = Pipeline::new(1).with_topology(topo).remain_topology(true);
        let featurizers: Vec<Box<dyn Featurizer>> = vec![Box::new(Counting {
            calls: Arc::new(AtomicUsize::new(0)),
            name: "a",
            needs: None,
        })];
        let table = pipeline.run(&featurizers).unwrap();
        assert_eq!(table.columns, vec!["n_neighbors_voro", "a voro"]);
        assert_eq!(table.rows[0], vec![3.0, 3.0]);
    }
}
