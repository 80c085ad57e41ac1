//! # contact_mesh
//!
//! Precomputed multi-resolution mesh hierarchies for graph neural networks.
//!
//! A hierarchy is a chain of mesh resolutions. Level 0 is the template mesh
//! and every further level is coarser. Each level carries a normalised
//! adjacency, and adjacent levels are connected by linear downsample and
//! upsample operators. Networks consume these as fixed artifacts through the
//! [`HierarchyProvider`] trait; deriving them by mesh decimation is out of
//! scope here.
//!
//! ## Modules
//!
//! - [`types`]: `Point3` and row-major packing helpers
//! - [`sparse`]: Coordinate-format sparse matrices and standard operators
//! - [`hierarchy`]: `MeshHierarchy`, validation and the JSON artifact format
//! - [`traits`]: `HierarchyProvider`, the seam consumed by `neural_contact`
//! - [`error`]: Error types
//!
//! ## Usage
//!
//! ```
//! use contact_mesh::prelude::*;
//!
//! let hierarchy = MeshHierarchy::ring(&[64, 32, 16]).unwrap();
//! assert_eq!(hierarchy.num_levels(), 3);
//!
//! let coarse = hierarchy.reference_vertices(2).unwrap();
//! assert_eq!(coarse.len(), 16);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hierarchy;
pub mod sparse;
pub mod traits;
pub mod types;

pub use error::{HierarchyError, Result};
pub use hierarchy::{normalized_adjacency, MeshHierarchy};
pub use sparse::SparseMatrix;
pub use traits::HierarchyProvider;
pub use types::Point3;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{HierarchyError, Result};
    pub use crate::hierarchy::{normalized_adjacency, MeshHierarchy};
    pub use crate::sparse::SparseMatrix;
    pub use crate::traits::HierarchyProvider;
    pub use crate::types::{points_to_rows, rows_to_points, Point3};
}
