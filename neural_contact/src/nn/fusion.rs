//! Fusion of the global image code with per-vertex template coordinates.

use burn::module::Module;
use burn::prelude::*;

use super::graph::{GraphLinear, GraphResBlock};
use crate::error::Result;
use crate::mesh::MeshOperators;

/// Number of coordinates per template vertex.
pub const VERTEX_CHANNELS: usize = 3;

/// Broadcasts the image feature vector to every base-level vertex, appends
/// the vertex coordinates and projects to the network width.
#[derive(Module, Debug)]
pub struct InputFusion<B: Backend> {
    /// `3 + image_features -> 2 * channels`.
    lin: GraphLinear<B>,
    /// `2 * channels -> channels` over the base-level adjacency.
    res: GraphResBlock<B>,
}

impl<B: Backend> InputFusion<B> {
    /// Create the fusion stage for `image_features` wide codes.
    pub fn new(
        image_features: usize,
        channels: usize,
        operators: &MeshOperators<B>,
        device: &B::Device,
    ) -> Result<Self> {
        Ok(Self {
            lin: GraphLinear::new(VERTEX_CHANNELS + image_features, 2 * channels, device),
            res: GraphResBlock::new(
                2 * channels,
                channels,
                operators.require_adjacency(0)?,
                device,
            ),
        })
    }

    /// Forward pass.
    ///
    /// Inputs: vertices `[batch, 3, vertices]`, features `[batch, image_features]`
    /// Output: `[batch, channels, vertices]`
    pub fn forward(&self, vertices: Tensor<B, 3>, image_features: Tensor<B, 2>) -> Tensor<B, 3> {
        let [batch, _, num_vertices] = vertices.dims();
        let [_, num_features] = image_features.dims();

        let tiled = image_features
            .reshape([batch, num_features, 1])
            .repeat_dim(2, num_vertices);
        let x = Tensor::cat(vec![vertices, tiled], 1);

        self.res.forward(self.lin.forward(x))
    }
}
