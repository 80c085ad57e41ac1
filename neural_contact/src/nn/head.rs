//! Per-vertex ground-contact classifier.

use burn::module::Module;
use burn::nn::{GroupNorm, GroupNormConfig, Relu};
use burn::prelude::*;
use burn::tensor::activation::softmax;

use super::graph::{GraphLinear, GraphResBlock};
use crate::error::Result;
use crate::mesh::MeshOperators;

/// Number of output classes: no contact, contact.
pub const CONTACT_CLASSES: usize = 2;

/// Class index that marks a vertex in contact with the ground.
pub const CONTACT_CLASS: i64 = 1;

/// Two residual blocks at the base level followed by a two-way projection.
#[derive(Module, Debug)]
pub struct ContactHead<B: Backend> {
    res1: GraphResBlock<B>,
    res2: GraphResBlock<B>,
    norm: GroupNorm<B>,
    activation: Relu,
    out: GraphLinear<B>,
}

impl<B: Backend> ContactHead<B> {
    /// Create a head reading `in_channels` wide decoder features.
    pub fn new(in_channels: usize, operators: &MeshOperators<B>, device: &B::Device) -> Result<Self> {
        let adjacency = operators.require_adjacency(0)?;

        Ok(Self {
            res1: GraphResBlock::new(in_channels, 64, adjacency.clone(), device),
            res2: GraphResBlock::new(64, 32, adjacency, device),
            norm: GroupNormConfig::new(4, 32).init(device),
            activation: Relu::new(),
            out: GraphLinear::new(32, CONTACT_CLASSES, device),
        })
    }

    /// Forward pass.
    ///
    /// Input shape: [batch, in_channels, n_base]
    /// Output shape: [batch, 2, n_base] raw logits
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.res2.forward(self.res1.forward(x));
        let x = self.activation.forward(self.norm.forward(x));
        self.out.forward(x)
    }
}

/// Hard per-vertex labels from contact logits, `[batch, n]` with values in {0, 1}.
pub fn contact_labels<B: Backend>(logits: Tensor<B, 3>) -> Tensor<B, 2, Int> {
    let [batch, _, num_vertices] = logits.dims();
    logits.argmax(1).reshape([batch, num_vertices])
}

/// Per-class probabilities, softmax over the class dimension.
pub fn contact_probabilities<B: Backend>(logits: Tensor<B, 3>) -> Tensor<B, 3> {
    softmax(logits, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;
    use contact_mesh::MeshHierarchy;

    type TestBackend = NdArray;

    #[test]
    fn test_head_shape() {
        let device = Default::default();
        let hierarchy = MeshHierarchy::ring(&[10, 5]).unwrap();
        let ops = MeshOperators::<TestBackend>::new(&hierarchy, 0, 1, &device).unwrap();
        let head = ContactHead::new(48, &ops, &device).unwrap();

        let x = Tensor::random([3, 48, 10], Distribution::Default, &device);
        assert_eq!(head.forward(x).dims(), [3, 2, 10]);
    }

    #[test]
    fn test_contact_labels() {
        let device = Default::default();
        // Vertex 0 prefers class 0, vertex 1 class 1.
        let logits = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(vec![2.0f32, -1.0, 0.5, 3.0], [1, 2, 2]),
            &device,
        );

        let labels = contact_labels(logits);
        assert_eq!(labels.dims(), [1, 2]);
        let values: Vec<i64> = labels.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(values, vec![0, CONTACT_CLASS]);
    }

    #[test]
    fn test_contact_probabilities_sum_to_one() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 3>::random([2, 2, 7], Distribution::Default, &device);

        let sums = contact_probabilities(logits).sum_dim(1);
        let diff: f32 = (sums - 1.0).abs().max().into_scalar();
        assert!(diff < 1e-5, "max diff {diff}");
    }
}
