//! Multiresolution graph decoder.

use burn::module::Module;
use burn::prelude::*;

use super::encoder::SkipCache;
use super::graph::GraphResBlock;
use crate::error::Result;
use crate::mesh::MeshOperators;

/// Result of a decoder pass.
#[derive(Debug, Clone)]
pub struct DecoderOutput<B: Backend> {
    /// Terminal activation at the base level, `[batch, (L+1)*channels, n_base]`.
    pub features: Tensor<B, 3>,
    /// Every stage output in production order, coarse to fine, `L + 1` entries.
    pub output_list: Vec<Tensor<B, 3>>,
}

/// Mirror of [`super::MultiresEncoder`] that walks back up to the base level.
///
/// Stage `i` runs at active stage `L - i` with width `(i + 1) * channels`,
/// upsamples one level and concatenates the matching skip activation, so
/// the width grows by `channels` per stage.
#[derive(Module, Debug)]
pub struct MultiresDecoder<B: Backend> {
    stages: Vec<GraphResBlock<B>>,
    terminal: GraphResBlock<B>,
}

impl<B: Backend> MultiresDecoder<B> {
    /// Create a decoder for an encoder of width `channels` over `operators`.
    pub fn new(channels: usize, operators: &MeshOperators<B>, device: &B::Device) -> Result<Self> {
        let num_layers = operators.depth();

        let stages = (0..num_layers)
            .map(|i| {
                let width = (i + 1) * channels;
                let adjacency = operators.require_adjacency(num_layers - i)?;
                Ok(GraphResBlock::new(width, width, adjacency, device))
            })
            .collect::<Result<Vec<_>>>()?;

        let width = (num_layers + 1) * channels;
        let terminal = GraphResBlock::new(width, width, operators.require_adjacency(0)?, device);

        Ok(Self { stages, terminal })
    }

    /// Output width of stage `i` (the terminal stage is `num_layers`).
    pub fn stage_channels(&self, i: usize) -> Option<usize> {
        match i.cmp(&self.stages.len()) {
            std::cmp::Ordering::Less => Some(self.stages[i].out_channels()),
            std::cmp::Ordering::Equal => Some(self.terminal.out_channels()),
            std::cmp::Ordering::Greater => None,
        }
    }

    /// Forward pass.
    ///
    /// # Panics
    ///
    /// If `skips` does not hold exactly one activation per decoder stage.
    pub fn forward(
        &self,
        bottleneck: Tensor<B, 3>,
        skips: SkipCache<B>,
        operators: &MeshOperators<B>,
    ) -> DecoderOutput<B> {
        let num_layers = self.stages.len();
        assert_eq!(
            skips.len(),
            num_layers,
            "skip cache holds {} entries for {} decoder stages",
            skips.len(),
            num_layers
        );

        let mut output_list = Vec::with_capacity(num_layers + 1);
        let mut x = bottleneck;

        for (i, (block, skip)) in self.stages.iter().zip(skips.into_lifo()).enumerate() {
            x = block.forward(x);
            output_list.push(x.clone());

            let upsampled = operators.upsample_step(x, num_layers - i - 1);
            x = Tensor::cat(vec![upsampled, skip], 1);
        }

        let features = self.terminal.forward(x);
        output_list.push(features.clone());

        DecoderOutput {
            features,
            output_list,
        }
    }
}
