//! Neural network modules for ground-contact prediction.
//!
//! This module provides:
//! - Graph primitives: position-wise linear layers, graph convolutions and
//!   residual blocks over `[batch, channels, vertices]` tensors
//! - The ResNet-34 image encoder
//! - The fusion, encoder, decoder and head stages of the network

pub mod decoder;
pub mod encoder;
pub mod fusion;
pub mod graph;
pub mod head;
pub mod resnet;

pub use decoder::{DecoderOutput, MultiresDecoder};
pub use encoder::{EncoderOutput, MultiresEncoder, SkipCache};
pub use fusion::InputFusion;
pub use graph::{GraphConvolution, GraphLinear, GraphResBlock};
pub use head::{contact_labels, contact_probabilities, ContactHead, CONTACT_CLASS};
pub use resnet::{ImageEncoder, ResNetTrunk, ResNetTrunkRecord, TRUNK_FEATURES};
