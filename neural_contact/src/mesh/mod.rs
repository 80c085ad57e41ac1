//! On-device mesh hierarchy operators.
//!
//! Bridges a `contact_mesh` hierarchy to Burn tensors: the active range of
//! levels is uploaded once at construction as sparse triplets and shared
//! read-only by every stage of the network.

mod operators;
mod sparse;

pub use operators::MeshOperators;
pub use sparse::SparseOperator;
