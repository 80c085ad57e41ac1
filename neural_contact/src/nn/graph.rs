//! Graph layers over per-vertex feature tensors.
//!
//! All layers work on `[batch, channels, vertices]` tensors. Position-wise
//! layers share weights across vertices; graph convolutions additionally mix
//! each vertex with its neighbours through a fixed adjacency.

use burn::module::{Module, Param};
use burn::nn::{GroupNorm, GroupNormConfig, Relu};
use burn::prelude::*;
use burn::tensor::Distribution;

use crate::mesh::SparseOperator;

/// Position-wise linear layer, a 1x1 convolution over vertices.
#[derive(Module, Debug)]
pub struct GraphLinear<B: Backend> {
    /// Weight `[out_channels, in_channels]`.
    weight: Param<Tensor<B, 2>>,
    /// Bias `[out_channels]`.
    bias: Param<Tensor<B, 1>>,
}

impl<B: Backend> GraphLinear<B> {
    /// Create a layer with weights drawn from `U(-1/(in*out), 1/(in*out))`.
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let bound = 1.0 / (in_channels * out_channels) as f64;
        let dist = Distribution::Uniform(-bound, bound);

        Self {
            weight: Param::from_tensor(Tensor::random([out_channels, in_channels], dist, device)),
            bias: Param::from_tensor(Tensor::random([out_channels], dist, device)),
        }
    }

    /// Forward pass.
    ///
    /// Input shape: [batch, in_channels, vertices]
    /// Output shape: [batch, out_channels, vertices]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, _, _] = x.dims();
        let [out_channels, in_channels] = self.weight.val().dims();

        let weight = self
            .weight
            .val()
            .unsqueeze::<3>()
            .expand([batch, out_channels, in_channels]);
        let bias = self.bias.val().reshape([1, out_channels, 1]);

        weight.matmul(x) + bias
    }

    /// Number of output channels.
    pub fn out_channels(&self) -> usize {
        self.weight.val().dims()[0]
    }
}

/// Graph convolution with a fixed, sparse adjacency.
///
/// Computes `A (x W) + b` per vertex: every vertex receives the
/// adjacency-weighted sum of its neighbours' projected features.
#[derive(Module, Debug)]
pub struct GraphConvolution<B: Backend> {
    /// Adjacency over the vertices, not trainable.
    adjacency: SparseOperator<B>,
    /// Weight `[in_channels, out_channels]`.
    weight: Param<Tensor<B, 2>>,
    /// Bias `[out_channels]`.
    bias: Param<Tensor<B, 1>>,
}

impl<B: Backend> GraphConvolution<B> {
    /// Create a convolution over a square `adjacency`.
    ///
    /// Weights are drawn from `U(-6/sqrt(in+out), 6/sqrt(in+out))`.
    pub fn new(
        adjacency: SparseOperator<B>,
        in_channels: usize,
        out_channels: usize,
        device: &B::Device,
    ) -> Self {
        let bound = 6.0 / ((in_channels + out_channels) as f64).sqrt();
        let dist = Distribution::Uniform(-bound, bound);

        Self {
            adjacency,
            weight: Param::from_tensor(Tensor::random([in_channels, out_channels], dist, device)),
            bias: Param::from_tensor(Tensor::random([out_channels], dist, device)),
        }
    }

    /// Forward pass.
    ///
    /// Input shape: [batch, in_channels, vertices]
    /// Output shape: [batch, out_channels, vertices]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, _, _] = x.dims();
        let [in_channels, out_channels] = self.weight.val().dims();

        let weight_t = self
            .weight
            .val()
            .transpose()
            .unsqueeze::<3>()
            .expand([batch, out_channels, in_channels]);
        let support = weight_t.matmul(x);
        let bias = self.bias.val().reshape([1, out_channels, 1]);

        self.adjacency.apply(support) + bias
    }

    /// Number of vertices the adjacency is defined over.
    pub fn num_vertices(&self) -> usize {
        self.adjacency.shape().0
    }
}

/// Residual block around a graph convolution.
///
/// ```text
/// x ─┬─ GN ─ ReLU ─ lin1 ─ GN ─ ReLU ─ conv ─ GN ─ ReLU ─ lin2 ─┐
///    └──────────────── skip (identity or GraphLinear) ──────────(+)─▶
/// ```
///
/// The inner convolution runs at half the output width.
#[derive(Module, Debug)]
pub struct GraphResBlock<B: Backend> {
    pre_norm: GroupNorm<B>,
    lin1: GraphLinear<B>,
    norm1: GroupNorm<B>,
    conv: GraphConvolution<B>,
    norm2: GroupNorm<B>,
    lin2: GraphLinear<B>,
    /// Projection for the skip path when the width changes.
    skip: Option<GraphLinear<B>>,
    activation: Relu,
}

impl<B: Backend> GraphResBlock<B> {
    /// Create a block mapping `in_channels` to `out_channels` over `adjacency`.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        adjacency: SparseOperator<B>,
        device: &B::Device,
    ) -> Self {
        let hidden = out_channels / 2;

        let skip = if in_channels != out_channels {
            Some(GraphLinear::new(in_channels, out_channels, device))
        } else {
            None
        };

        Self {
            pre_norm: group_norm(in_channels, device),
            lin1: GraphLinear::new(in_channels, hidden, device),
            norm1: group_norm(hidden, device),
            conv: GraphConvolution::new(adjacency, hidden, hidden, device),
            norm2: group_norm(hidden, device),
            lin2: GraphLinear::new(hidden, out_channels, device),
            skip,
            activation: Relu::new(),
        }
    }

    /// Forward pass.
    ///
    /// Input shape: [batch, in_channels, vertices]
    /// Output shape: [batch, out_channels, vertices]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let y = self.activation.forward(self.pre_norm.forward(x.clone()));
        let y = self.lin1.forward(y);
        let y = self.activation.forward(self.norm1.forward(y));
        let y = self.conv.forward(y);
        let y = self.activation.forward(self.norm2.forward(y));
        let y = self.lin2.forward(y);

        let x = match &self.skip {
            Some(skip) => skip.forward(x),
            None => x,
        };

        x + y
    }

    /// Number of output channels.
    pub fn out_channels(&self) -> usize {
        self.lin2.out_channels()
    }

    /// Number of vertices the block's adjacency is defined over.
    pub fn num_vertices(&self) -> usize {
        self.conv.num_vertices()
    }
}

/// Group norm with groups of 8 channels (at least one group).
pub(crate) fn group_norm<B: Backend>(channels: usize, device: &B::Device) -> GroupNorm<B> {
    GroupNormConfig::new((channels / 8).max(1), channels).init(device)
}
