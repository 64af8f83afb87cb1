// src/config.rs

use crate::error::{Result, SroError};
use crate::model::{Provider, RadiusType};
use crate::physics::analysis::voronoi::DEFAULT_MOTIFS;
use crate::physics::analysis::{
  AreaWtIFoldSymmetry, Boop, CalcVolumeArea, CharacterMotif, Cn, DistStats, EdgeRange,
  IFoldSymmetry, VolWtIFoldSymmetry, VolumeAreaInterstice, VoroAreaStats, VoroAreaStatsSeparate,
  VoroVolStats, VoroVolStatsSeparate, VoronoiIndex,
};
use crate::physics::harmonics::MAX_ORDER;
use crate::pipeline::{Featurizer, Pipeline};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

// --- Enums ---

/// Featurizer families, in the default run order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
  Cn,
  VoronoiIndex,
  CharacterMotif,
  IFoldSymmetry,
  AreaWtIFoldSymmetry,
  VolWtIFoldSymmetry,
  VoroAreaStats,
  VoroAreaStatsSeparate,
  VoroVolStats,
  VoroVolStatsSeparate,
  DistStats,
  Boop,
  VolumeAreaInterstice,
}

impl FeatureKind {
  pub const ALL: [FeatureKind; 13] = [
    FeatureKind::Cn,
    FeatureKind::VoronoiIndex,
    FeatureKind::CharacterMotif,
    FeatureKind::IFoldSymmetry,
    FeatureKind::AreaWtIFoldSymmetry,
    FeatureKind::VolWtIFoldSymmetry,
    FeatureKind::VoroAreaStats,
    FeatureKind::VoroAreaStatsSeparate,
    FeatureKind::VoroVolStats,
    FeatureKind::VoroVolStatsSeparate,
    FeatureKind::DistStats,
    FeatureKind::Boop,
    FeatureKind::VolumeAreaInterstice,
  ];

  /// Reads facet edges, areas or volumes, which only a Voronoi topology has
  pub fn voro_only(self) -> bool {
    !matches!(
      self,
      FeatureKind::Cn | FeatureKind::DistStats | FeatureKind::Boop | FeatureKind::VolumeAreaInterstice
    )
  }

  /// Every kind the provider can feed, in run order
  pub fn defaults_for(provider: Provider) -> Vec<FeatureKind> {
    FeatureKind::ALL
      .iter()
      .copied()
      .filter(|k| provider == Provider::Voro || !k.voro_only())
      .collect()
  }
}

// --- Defaults ---

fn default_neighbor_limit() -> usize {
  80
}
fn default_edge_min() -> usize {
  3
}
fn default_edge_max() -> usize {
  7
}
fn default_true() -> bool {
  true
}
fn default_dist_type() -> String {
  "distance".to_string()
}
fn default_boop_orders() -> Vec<usize> {
  vec![4, 6, 8, 10]
}
fn default_motif_targets() -> Vec<[u32; 5]> {
  DEFAULT_MOTIFS.to_vec()
}

// --- Main Config Struct ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SroConfig {
  #[serde(default)]
  pub provider: Provider,

  /// Width of the per-slot topology columns
  #[serde(default = "default_neighbor_limit")]
  pub neighbor_limit: usize,

  #[serde(default = "default_edge_min")]
  pub edge_min: usize,

  #[serde(default = "default_edge_max")]
  pub edge_max: usize,

  /// Count facets with more than `edge_max` edges in the last bin
  #[serde(default = "default_true")]
  pub include_beyond_edge_max: bool,

  #[serde(default)]
  pub radius_type: RadiusType,

  #[serde(default = "default_true")]
  pub calc_packing_efficiency: bool,

  #[serde(default)]
  pub calc_volume_area: CalcVolumeArea,

  #[serde(default = "default_dist_type")]
  pub dist_type: String,

  #[serde(default = "default_boop_orders")]
  pub boop_orders: Vec<usize>,

  #[serde(default = "default_true")]
  pub boop_coarse_grained: bool,

  #[serde(default = "default_motif_targets")]
  pub motif_targets: Vec<[u32; 5]>,

  #[serde(default = "default_true")]
  pub frank_kasper: bool,

  /// Atomic number of each compact 1-based local type, e.g. `[29, 40]`
  #[serde(default)]
  pub types_atomic_number_list: Option<Vec<u32>>,

  #[serde(default = "default_true")]
  pub parallel: bool,

  /// Keep the input topology columns in front of the features
  #[serde(default)]
  pub remain_topology: bool,

  /// Featurizers to run; `None` runs everything the provider supports
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub features: Option<Vec<FeatureKind>>,
}

impl Default for SroConfig {
  fn default() -> Self {
    Self {
      provider: Provider::Voro,
      neighbor_limit: default_neighbor_limit(),
      edge_min: default_edge_min(),
      edge_max: default_edge_max(),
      include_beyond_edge_max: true,
      radius_type: RadiusType::Miracle,
      calc_packing_efficiency: true,
      calc_volume_area: CalcVolumeArea::All,
      dist_type: default_dist_type(),
      boop_orders: default_boop_orders(),
      boop_coarse_grained: true,
      motif_targets: default_motif_targets(),
      frank_kasper: true,
      types_atomic_number_list: None,
      parallel: true,
      remain_topology: false,
      features: None,
    }
  }
}

impl SroConfig {
  pub fn validate(&self) -> Result<()> {
    if self.edge_min > self.edge_max {
      return Err(SroError::InvalidConfig(format!(
        "edge_min ({}) must not exceed edge_max ({})",
        self.edge_min, self.edge_max
      )));
    }
    if self.neighbor_limit == 0 {
      return Err(SroError::InvalidConfig(
        "neighbor_limit must be positive".to_string(),
      ));
    }
    if self.boop_orders.is_empty() {
      return Err(SroError::InvalidConfig(
        "boop_orders must not be empty".to_string(),
      ));
    }
    if let Some(l) = self.boop_orders.iter().find(|&&l| l > MAX_ORDER) {
      return Err(SroError::InvalidConfig(format!(
        "BOOP order {} exceeds the supported maximum {}",
        l, MAX_ORDER
      )));
    }
    if self.motif_targets.is_empty() {
      return Err(SroError::InvalidConfig(
        "motif_targets must not be empty".to_string(),
      ));
    }
    if self.provider == Provider::Dist {
      if let Some(kind) = self.features().into_iter().find(|k| k.voro_only()) {
        return Err(SroError::InvalidConfig(format!(
          "feature {:?} needs a voro topology but provider is dist",
          kind
        )));
      }
    }
    Ok(())
  }

  pub fn features(&self) -> Vec<FeatureKind> {
    match &self.features {
      Some(list) => list.clone(),
      None => FeatureKind::defaults_for(self.provider),
    }
  }

  /// Packing features look up per-type radii
  pub fn needs_radii(&self) -> bool {
    self.features().contains(&FeatureKind::VolumeAreaInterstice)
  }

  pub fn edge_range(&self) -> EdgeRange {
    EdgeRange::new(self.edge_min, self.edge_max, self.include_beyond_edge_max)
  }

  /// Reads and validates a config file
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let reader = BufReader::new(File::open(path)?);
    let cfg: Self = serde_json::from_reader(reader)?;
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, self)?;
    Ok(())
  }

  /// Loads from the standard OS location (e.g. ~/.config/srofeat/settings.json),
  /// falling back to defaults. The message says which happened.
  pub fn load_or_default() -> (Self, String) {
    let path = Self::default_path();
    if !path.exists() {
      return (
        Self::default(),
        "No config found. Using defaults.".to_string(),
      );
    }
    match Self::load(&path) {
      Ok(cfg) => (cfg, format!("Config loaded from {:?}", path)),
      Err(e) => (Self::default(), format!("Error loading config: {}", e)),
    }
  }

  pub fn default_path() -> PathBuf {
    if let Some(proj) = ProjectDirs::from("org", "sro", "srofeat") {
      proj.config_dir().join("settings.json")
    } else {
      PathBuf::from("settings.json")
    }
  }

  /// Instantiates the configured featurizers in order
  pub fn build_featurizers(&self) -> Vec<Box<dyn Featurizer>> {
    let edges = self.edge_range();
    self
      .features()
      .into_iter()
      .map(|kind| -> Box<dyn Featurizer> {
        match kind {
          FeatureKind::Cn => Box::new(Cn::new(self.provider)),
          FeatureKind::VoronoiIndex => Box::new(VoronoiIndex::new(edges)),
          FeatureKind::CharacterMotif => Box::new(CharacterMotif::new(
            edges,
            self.motif_targets.clone(),
            self.frank_kasper,
          )),
          FeatureKind::IFoldSymmetry => Box::new(IFoldSymmetry::new(edges)),
          FeatureKind::AreaWtIFoldSymmetry => Box::new(AreaWtIFoldSymmetry::new(edges)),
          FeatureKind::VolWtIFoldSymmetry => Box::new(VolWtIFoldSymmetry::new(edges)),
          FeatureKind::VoroAreaStats => Box::new(VoroAreaStats),
          FeatureKind::VoroAreaStatsSeparate => Box::new(VoroAreaStatsSeparate::new(edges)),
          FeatureKind::VoroVolStats => Box::new(VoroVolStats),
          FeatureKind::VoroVolStatsSeparate => Box::new(VoroVolStatsSeparate::new(edges)),
          FeatureKind::DistStats => Box::new(DistStats::new(self.provider, self.dist_type.clone())),
          FeatureKind::Boop => Box::new(Boop::new(
            self.provider,
            self.boop_orders.clone(),
            self.boop_coarse_grained,
          )),
          FeatureKind::VolumeAreaInterstice => Box::new(VolumeAreaInterstice {
            provider: self.provider,
            radius_type: self.radius_type,
            calc_packing_efficiency: self.calc_packing_efficiency,
            calc_volume_area: self.calc_volume_area,
          }),
        }
      })
      .collect()
  }

  /// An empty pipeline carrying this config's run options
  pub fn pipeline(&self) -> Pipeline {
    let mut pipeline = Pipeline::new(self.neighbor_limit)
      .parallel(self.parallel)
      .remain_topology(self.remain_topology);
    if let Some(mapping) = &self.types_atomic_number_list {
      pipeline = pipeline.with_type_mapping(mapping.clone());
    }
    pipeline
  }
}
