// src/utils/mod.rs
pub mod geometry;
pub mod logger;
pub mod stats;

pub use stats::{calc_stats, compensated_sum, NeumaierSum, STAT_NAMES};
