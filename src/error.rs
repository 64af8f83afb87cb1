// src/error.rs

use thiserror::Error;

/// Fatal errors. Any of these aborts the whole batch.
///
/// Per-atom geometry trouble is *not* reported here; see
/// [`GeometryError`](crate::physics::hull::GeometryError), which featurizers
/// fold into the zero-row convention.
#[derive(Debug, Error)]
pub enum SroError {
    /// A referenced atom type has no entry (or no value for the requested
    /// convention) in the radius table.
    #[error("no {radius_type} configured for atom type {atom_type}")]
    MissingRadius {
        atom_type: u32,
        radius_type: &'static str,
    },

    /// Glass packing efficiency only has ideal ratios for CN 3..=24.
    #[error("coordination number {0} is outside the supported ideal-ratio range 3..=24")]
    UnsupportedCoordination(usize),

    /// Coordinates, box bounds or the radius table were not supplied.
    #[error("required geometry input is missing: {0}")]
    MissingGeometry(&'static str),

    /// Topology columns a featurizer needs are absent and no provider could
    /// build them.
    #[error("featurizer '{featurizer}' requires missing columns: {}", columns.join(", "))]
    MissingColumns {
        featurizer: String,
        columns: Vec<String>,
    },

    /// A neighbor slot refers to an atom id the snapshot does not contain.
    #[error("atom {atom_id} lists neighbor {neighbor_id}, which is not in the snapshot")]
    UnknownNeighbor { atom_id: i64, neighbor_id: i64 },

    /// A topology row refers to an atom id the snapshot does not contain.
    #[error("topology row for atom {0} has no matching atom in the snapshot")]
    UnknownAtom(i64),

    #[error("local type {local_type} cannot be remapped: the mapping has {len} entries")]
    InvalidTypeMapping { local_type: u32, len: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two tables that should be row-aligned are not.
    #[error("row count mismatch: expected {expected}, found {found}")]
    RowMismatch { expected: usize, found: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SroError {
    /// Creates a [`MissingColumns`](SroError::MissingColumns) error.
    pub fn missing_columns(featurizer: impl Into<String>, columns: Vec<String>) -> Self {
        Self::MissingColumns {
            featurizer: featurizer.into(),
            columns,
        }
    }
}

pub type Result<T> = std::result::Result<T, SroError>;
