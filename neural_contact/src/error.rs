//! Error types for neural_contact.

use thiserror::Error;

/// Errors that can occur while building or running a ground-contact network.
#[derive(Error, Debug)]
pub enum NeuralContactError {
    /// Invalid configuration, detected at construction time.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Tensor shape mismatch.
    #[error("tensor shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        got: Vec<usize>,
    },

    /// Error raised by the mesh hierarchy.
    #[error("mesh hierarchy error: {0}")]
    Hierarchy(#[from] contact_mesh::HierarchyError),
}

impl NeuralContactError {
    /// Creates an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Result type for neural_contact operations.
pub type Result<T> = std::result::Result<T, NeuralContactError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NeuralContactError::invalid_config("num_layers must be positive");
        assert_eq!(
            err.to_string(),
            "invalid configuration: num_layers must be positive"
        );

        let err = NeuralContactError::ShapeMismatch {
            expected: vec![2, 3, 64, 64],
            got: vec![2, 1, 64, 64],
        };
        assert!(err.to_string().contains("[2, 1, 64, 64]"));
    }

    #[test]
    fn test_from_hierarchy_error() {
        let err: NeuralContactError = contact_mesh::HierarchyError::LevelOutOfRange {
            level: 4,
            num_levels: 2,
        }
        .into();
        assert!(matches!(err, NeuralContactError::Hierarchy(_)));
    }
}
