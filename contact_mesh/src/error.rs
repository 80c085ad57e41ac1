//! Error types for contact_mesh operations.

use thiserror::Error;

/// Errors that can occur while building, validating or applying a mesh hierarchy.
#[derive(Error, Debug)]
pub enum HierarchyError {
    /// A sparse entry lies outside the matrix bounds.
    #[error("sparse entry ({row}, {col}) out of bounds for a {rows}x{cols} matrix")]
    IndexOutOfBounds {
        /// Row of the offending entry.
        row: usize,
        /// Column of the offending entry.
        col: usize,
        /// Number of matrix rows.
        rows: usize,
        /// Number of matrix columns.
        cols: usize,
    },

    /// An operator or feature block does not have the expected dimensions.
    #[error("{what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// What was being checked.
        what: String,
        /// Expected `(rows, cols)`.
        expected: (usize, usize),
        /// Actual `(rows, cols)`.
        got: (usize, usize),
    },

    /// A resolution level outside the hierarchy was requested.
    #[error("level {level} out of range for a hierarchy with {num_levels} levels")]
    LevelOutOfRange {
        /// The requested level.
        level: usize,
        /// Number of levels in the hierarchy.
        num_levels: usize,
    },

    /// The hierarchy is structurally invalid.
    #[error("invalid hierarchy: {message}")]
    InvalidHierarchy {
        /// Description of the problem.
        message: String,
    },

    /// I/O error while reading or writing a hierarchy file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Triplets that do not describe a valid sparse matrix.
    #[error("sparse format error: {0}")]
    Format(#[from] nalgebra_sparse::SparseFormatError),

    /// Malformed hierarchy JSON.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl HierarchyError {
    /// Creates an invalid hierarchy error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidHierarchy {
            message: message.into(),
        }
    }

    /// Creates a shape mismatch error.
    pub fn shape(what: impl Into<String>, expected: (usize, usize), got: (usize, usize)) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            got,
        }
    }
}

/// Result type for contact_mesh operations.
pub type Result<T> = std::result::Result<T, HierarchyError>;
