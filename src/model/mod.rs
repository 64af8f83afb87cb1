//src/model/mod.rs
pub mod radii;
pub mod structure;
pub mod table;
pub mod topology;

// Re-exports for cleaner imports
pub use radii::{RadiusRecord, RadiusTable, RadiusType};
pub use structure::{Atom, Snapshot};
pub use table::FeatureTable;
pub use topology::{NeighborProvider, NeighborRecord, NeighborTopology, Provider, TopologyColumn};
