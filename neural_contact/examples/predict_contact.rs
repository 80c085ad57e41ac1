//! Example: ground-contact prediction over a synthetic mesh hierarchy.
//!
//! Builds a ring hierarchy, runs the network on a batch of random images and
//! reports the shapes of every output together with the number of vertices
//! predicted to touch the ground.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info cargo run -p neural_contact --example predict_contact
//! ```
//!
//! Pass a path to a hierarchy JSON file to use it instead of the ring.

use burn::backend::NdArray;
use burn::prelude::*;
use burn::tensor::Distribution;

use neural_contact::{
    contact_labels, contact_probabilities, GroundContactNetConfig, HierarchyProvider,
    MeshHierarchy, Result,
};

type MyBackend = NdArray;

const BATCH: usize = 2;
const IMAGE_SIZE: usize = 64;

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let device = burn::backend::ndarray::NdArrayDevice::Cpu;

    let hierarchy = match std::env::args().nth(1) {
        Some(path) => MeshHierarchy::load_json(&path)?,
        None => MeshHierarchy::ring(&[96, 48, 24, 12, 6, 3])?,
    };

    println!("Mesh hierarchy");
    for level in 0..hierarchy.num_levels() {
        println!("  level {level}: {} vertices", hierarchy.num_vertices(level)?);
    }
    println!();

    let num_layers = hierarchy.num_levels().saturating_sub(1).min(5);
    let config = GroundContactNetConfig::new()
        .with_num_layers(num_layers)
        .with_num_channels(64)
        .with_n_resnet_out(128);
    let model = config.init::<MyBackend, _>(&hierarchy, &device)?;

    let images = Tensor::<MyBackend, 4>::random(
        [BATCH, config.n_resnet_in, IMAGE_SIZE, IMAGE_SIZE],
        Distribution::Default,
        &device,
    );
    let out = model.try_forward(images)?;

    println!("Decoder outputs (coarse to fine)");
    for (i, tensor) in out.output_list.iter().enumerate() {
        println!("  stage {i}: {:?}", tensor.dims());
    }
    println!("Ground contact logits: {:?}", out.ground_contact.dims());
    println!();

    let probabilities = contact_probabilities(out.ground_contact.clone());
    let labels = contact_labels(out.ground_contact);
    let counts = labels.sum_dim(1).into_data();
    let mean_probability: f32 = probabilities.narrow(1, 1, 1).mean().into_scalar();

    for (item, count) in counts.iter::<i64>().enumerate() {
        println!(
            "  image {item}: {count} of {} vertices in contact",
            model.base_vertices()
        );
    }
    println!("Mean contact probability: {mean_probability:.3}");

    Ok(())
}
