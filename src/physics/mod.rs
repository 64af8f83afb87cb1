// src/physics/mod.rs
pub mod analysis;
pub mod harmonics;
pub mod hull;
pub mod packing;

pub use hull::{ConvexHull, GeometryError};
pub use packing::SitePacking;
