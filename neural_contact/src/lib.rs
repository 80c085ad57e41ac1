//! # neural_contact
//!
//! Per-vertex ground-contact prediction with Burn.
//!
//! A ResNet-34 image encoder produces a global feature vector that is tiled
//! onto the vertices of a template mesh. A graph-convolutional encoder then
//! walks down a precomputed mesh hierarchy from `contact_mesh`, and a
//! decoder walks back up with skip connections. A small head classifies
//! every base-level vertex as touching the ground or not.
//!
//! ## Features
//!
//! - **Graph layers**: `GraphLinear`, `GraphConvolution`, `GraphResBlock`
//! - **Image encoder**: ResNet-34 trunk with optional pretrained weights
//! - **Multiresolution encoder/decoder** with a LIFO skip cache
//! - **Contact head** with label and probability helpers
//!
//! ## Quick Start
//!
//! ```no_run
//! use burn::backend::NdArray;
//! use burn::prelude::*;
//! use contact_mesh::MeshHierarchy;
//! use neural_contact::{contact_labels, GroundContactNetConfig};
//!
//! let device = Default::default();
//! let hierarchy = MeshHierarchy::ring(&[96, 48, 24, 12, 6, 3]).unwrap();
//!
//! let model = GroundContactNetConfig::new()
//!     .init::<NdArray, _>(&hierarchy, &device)
//!     .unwrap();
//!
//! let images = Tensor::zeros([2, 3, 224, 224], &device);
//! let out = model.forward(images);
//! let labels = contact_labels(out.ground_contact);
//! assert_eq!(labels.dims(), [2, 96]);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! contact_mesh (hierarchy, sparse operators)
//!     │
//!     ▼
//! neural_contact::mesh (sparse on-device operators)
//!     │
//!     ▼
//! image ─▶ nn::resnet ─▶ nn::fusion ─▶ nn::encoder ─▶ nn::decoder ─▶ nn::head
//! ```
//!
//! ## Feature Flags
//!
//! - `ndarray` (default): CPU backend using ndarray
//! - `wgpu`: GPU acceleration via WebGPU

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod mesh;
pub mod model;
pub mod nn;

// Re-export key types for convenience
pub use config::{GroundContactNetConfig, ImageEncoderConfig};
pub use error::{NeuralContactError, Result};
pub use mesh::{MeshOperators, SparseOperator};
pub use model::{ContactOutput, GroundContactNet};
pub use nn::{contact_labels, contact_probabilities};

// Re-export from contact_mesh for convenience
pub use contact_mesh::{HierarchyProvider, MeshHierarchy, Point3};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{GroundContactNetConfig, ImageEncoderConfig, RESNET_NATIVE_CHANNELS};
    pub use crate::error::{NeuralContactError, Result};
    pub use crate::mesh::{MeshOperators, SparseOperator};
    pub use crate::model::{ContactOutput, GroundContactNet};
    pub use crate::nn::{
        contact_labels, contact_probabilities, ContactHead, GraphConvolution, GraphLinear,
        GraphResBlock, ImageEncoder, InputFusion, MultiresDecoder, MultiresEncoder,
        ResNetTrunk, ResNetTrunkRecord, SkipCache, CONTACT_CLASS,
    };

    pub use contact_mesh::{HierarchyProvider, MeshHierarchy, Point3, SparseMatrix};
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::prelude::*;

    type TestBackend = NdArray;

    #[test]
    fn test_public_api() {
        // Verify that the public API is accessible
        let _config = GroundContactNetConfig::default();
        let _encoder_config = ImageEncoderConfig::new();
        let _hierarchy = MeshHierarchy::ring(&[8, 4]).unwrap();
    }

    #[test]
    fn test_model_creation() {
        let device = Default::default();
        let hierarchy = MeshHierarchy::ring(&[8, 4]).unwrap();
        let model = GroundContactNetConfig::new()
            .with_num_layers(1)
            .with_num_channels(16)
            .init::<TestBackend, _>(&hierarchy, &device)
            .unwrap();

        assert_eq!(model.base_vertices(), 8);
    }

    #[test]
    fn test_labels_from_forward() {
        let device = Default::default();
        let hierarchy = MeshHierarchy::ring(&[8, 4]).unwrap();
        let model = GroundContactNetConfig::new()
            .with_num_layers(1)
            .with_num_channels(16)
            .with_n_resnet_out(8)
            .init::<TestBackend, _>(&hierarchy, &device)
            .unwrap();

        let images = Tensor::<TestBackend, 4>::ones([1, 3, 32, 32], &device);
        let labels = contact_labels(model.forward(images).ground_contact);

        let values: Vec<i64> = labels.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(values.len(), 8);
        assert!(values.iter().all(|&v| v == 0 || v == 1));
    }
}
