// src/lib.rs

//! Short-range-order descriptors for atomistic snapshots.
//!
//! Each featurizer reads a neighbor-topology table (built elsewhere by a
//! Voronoi or distance-cutoff neighbor search) plus atom coordinates, and
//! emits one row of named columns per atom:
//!
//! - packing efficiency and interstices over the neighbor convex hull
//! - Voronoi index, motif one-hot and i-fold symmetry
//! - bond-orientational order parameters
//! - area, volume and distance statistics
//!
//! [`pipeline::Pipeline`] runs a list of featurizers, resolves the topology
//! columns and prerequisites they need, and merges the results.

pub mod config;
pub mod error;
pub mod model;
pub mod physics;
pub mod pipeline;
pub mod utils;

pub use config::{FeatureKind, SroConfig};
pub use error::{Result, SroError};
pub use pipeline::{FeatureContext, Featurizer, Pipeline};
