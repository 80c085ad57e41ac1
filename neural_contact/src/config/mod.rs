//! Configuration types for neural_contact.
//!
//! Burn-style configuration structs for the image encoder and the full
//! ground-contact network. Every struct derives `burn::config::Config`, so it
//! gets `with_*` builders and JSON save/load for free.

mod network;

pub use network::{GroundContactNetConfig, ImageEncoderConfig, RESNET_NATIVE_CHANNELS};
