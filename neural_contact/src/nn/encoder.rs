//! Multiresolution graph encoder and the skip cache it fills.

use burn::module::Module;
use burn::prelude::*;

use super::graph::GraphResBlock;
use crate::error::Result;
use crate::mesh::MeshOperators;

/// Encoder activations kept for the decoder's skip connections.
///
/// Entry 0 is the fused input at the base level. Entry `k >= 1` is the
/// output of encoder stage `k - 1` after it was downsampled, so every entry
/// sits at active stage `k`. The decoder consumes entries last-in first-out.
#[derive(Debug, Clone)]
pub struct SkipCache<B: Backend> {
    entries: Vec<Tensor<B, 3>>,
}

impl<B: Backend> SkipCache<B> {
    /// Start a cache seeded with the fused input activation.
    pub fn new(input: Tensor<B, 3>) -> Self {
        Self {
            entries: vec![input],
        }
    }

    /// Append an encoder activation.
    pub fn push(&mut self, x: Tensor<B, 3>) {
        self.entries.push(x);
    }

    /// Take the most recently pushed activation.
    pub fn pop(&mut self) -> Option<Tensor<B, 3>> {
        self.entries.pop()
    }

    /// Consume the cache, yielding activations most recent first.
    pub fn into_lifo(self) -> impl Iterator<Item = Tensor<B, 3>> {
        self.entries.into_iter().rev()
    }

    /// Number of cached activations, the fused input included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True once every entry has been popped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached activation at `index` (0 is the fused input).
    pub fn get(&self, index: usize) -> Option<&Tensor<B, 3>> {
        self.entries.get(index)
    }

    /// Activations pushed by encoder stages, without the fused input.
    pub fn stage_entries(&self) -> &[Tensor<B, 3>] {
        self.entries.get(1..).unwrap_or(&[])
    }
}

/// Result of an encoder pass.
#[derive(Debug, Clone)]
pub struct EncoderOutput<B: Backend> {
    /// Terminal activation at the deepest active level, `[batch, channels, n]`.
    pub bottleneck: Tensor<B, 3>,
    /// Activations for the decoder, `num_layers` entries.
    pub skips: SkipCache<B>,
}

/// Stack of residual graph blocks, each followed by a downsample.
///
/// Stage `i` runs at active stage `i` and hands its output to stage `i + 1`
/// one level coarser. The terminal block runs at the deepest level without
/// downsampling.
#[derive(Module, Debug)]
pub struct MultiresEncoder<B: Backend> {
    stages: Vec<GraphResBlock<B>>,
    terminal: GraphResBlock<B>,
}

impl<B: Backend> MultiresEncoder<B> {
    /// Create an encoder of constant width `channels` spanning every
    /// active level of `operators`.
    pub fn new(channels: usize, operators: &MeshOperators<B>, device: &B::Device) -> Result<Self> {
        let num_layers = operators.depth();

        let stages = (0..num_layers)
            .map(|stage| {
                let adjacency = operators.require_adjacency(stage)?;
                Ok(GraphResBlock::new(channels, channels, adjacency, device))
            })
            .collect::<Result<Vec<_>>>()?;
        let terminal = GraphResBlock::new(
            channels,
            channels,
            operators.require_adjacency(num_layers)?,
            device,
        );

        Ok(Self { stages, terminal })
    }

    /// Number of downsampling stages.
    pub fn num_layers(&self) -> usize {
        self.stages.len()
    }

    /// Forward pass.
    ///
    /// Input: fused activation `[batch, channels, n_base]`
    pub fn forward(&self, x: Tensor<B, 3>, operators: &MeshOperators<B>) -> EncoderOutput<B> {
        let num_layers = self.stages.len();
        let mut skips = SkipCache::new(x.clone());

        let mut x = x;
        for (stage, block) in self.stages.iter().enumerate() {
            x = operators.downsample_step(block.forward(x), stage);
            if stage + 1 < num_layers {
                skips.push(x.clone());
            }
        }

        EncoderOutput {
            bottleneck: self.terminal.forward(x),
            skips,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;
    use contact_mesh::MeshHierarchy;

    type TestBackend = NdArray;

    fn setup(sizes: &[usize], num_layers: usize) -> (MeshOperators<TestBackend>, MultiresEncoder<TestBackend>) {
        let device = Default::default();
        let hierarchy = MeshHierarchy::ring(sizes).unwrap();
        let ops = MeshOperators::new(&hierarchy, 0, num_layers, &device).unwrap();
        let encoder = MultiresEncoder::new(16, &ops, &device).unwrap();
        (ops, encoder)
    }

    #[test]
    fn test_skip_cache_lifo() {
        let device = Default::default();
        let mut cache = SkipCache::<TestBackend>::new(Tensor::zeros([1, 1, 4], &device));
        cache.push(Tensor::ones([1, 1, 2], &device));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stage_entries().len(), 1);
        assert_eq!(cache.get(0).unwrap().dims(), [1, 1, 4]);
        assert_eq!(cache.pop().unwrap().dims(), [1, 1, 2]);
        assert_eq!(cache.pop().unwrap().dims(), [1, 1, 4]);
        assert!(cache.pop().is_none());
        assert!(cache.is_empty());
        assert!(cache.stage_entries().is_empty());
    }

    #[test]
    fn test_skip_cache_into_lifo() {
        let device = Default::default();
        let mut cache = SkipCache::<TestBackend>::new(Tensor::zeros([1, 1, 8], &device));
        cache.push(Tensor::zeros([1, 1, 4], &device));
        cache.push(Tensor::zeros([1, 1, 2], &device));

        let sizes: Vec<usize> = cache.into_lifo().map(|t| t.dims()[2]).collect();
        assert_eq!(sizes, vec![2, 4, 8]);
    }

    #[test]
    fn test_encoder_shapes() {
        let (ops, encoder) = setup(&[32, 16, 8, 4], 3);
        assert_eq!(encoder.num_layers(), 3);

        let x = Tensor::random([2, 16, 32], Distribution::Default, &Default::default());
        let out = encoder.forward(x, &ops);

        assert_eq!(out.bottleneck.dims(), [2, 16, 4]);
        assert_eq!(out.skips.len(), 3);
        // Entry k sits at active stage k.
        let sizes: Vec<usize> = (0..3)
            .map(|k| out.skips.get(k).unwrap().dims()[2])
            .collect();
        assert_eq!(sizes, vec![32, 16, 8]);
    }

    #[test]
    fn test_single_layer_keeps_only_input() {
        let (ops, encoder) = setup(&[8, 4], 1);

        let x = Tensor::random([1, 16, 8], Distribution::Default, &Default::default());
        let out = encoder.forward(x.clone(), &ops);

        assert_eq!(out.bottleneck.dims(), [1, 16, 4]);
        assert_eq!(out.skips.len(), 1);
        assert!(out.skips.stage_entries().is_empty());

        let diff: f32 = (out.skips.get(0).unwrap().clone() - x)
            .abs()
            .max()
            .into_scalar();
        assert_eq!(diff, 0.0);
    }
}
