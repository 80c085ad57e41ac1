//! ResNet-34 image encoder.
//!
//! The trunk follows the torchvision layout (stem, four stages of basic
//! blocks, global average pooling) so pretrained trunk records map onto it
//! field for field. The classification layer is replaced by a freshly
//! initialised projection to the configured feature width.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::*;

use crate::config::ImageEncoderConfig;
use crate::error::{NeuralContactError, Result};

/// Blocks per stage for ResNet-34.
const RESNET34_BLOCKS: [usize; 4] = [3, 4, 6, 3];

/// Output channels per stage.
const STAGE_CHANNELS: [usize; 4] = [64, 128, 256, 512];

/// Width of the pooled trunk output.
pub const TRUNK_FEATURES: usize = 512;

fn conv3x3<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_bias(false)
        .init(device)
}

/// Blocks of stage `stage`; all but the first stage halve the resolution.
fn basic_stage<B: Backend>(stage: usize, device: &B::Device) -> Vec<BasicBlock<B>> {
    let out_channels = STAGE_CHANNELS[stage];
    let (in_channels, stride) = match stage {
        0 => (STAGE_CHANNELS[0], 1),
        _ => (STAGE_CHANNELS[stage - 1], 2),
    };

    let mut blocks = Vec::with_capacity(RESNET34_BLOCKS[stage]);
    blocks.push(BasicBlock::new(in_channels, out_channels, stride, device));
    for _ in 1..RESNET34_BLOCKS[stage] {
        blocks.push(BasicBlock::new(out_channels, out_channels, 1, device));
    }
    blocks
}

/// Strided 1x1 projection used when a block changes resolution or width.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B>,
}

impl<B: Backend> Downsample<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [1, 1])
            .with_stride([stride, stride])
            .with_bias(false)
            .init(device);

        Self {
            conv,
            bn: BatchNormConfig::new(out_channels).init(device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// Two 3x3 convolutions with a residual connection.
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B>,
    downsample: Option<Downsample<B>>,
    activation: Relu,
}

impl<B: Backend> BasicBlock<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let downsample = if stride != 1 || in_channels != out_channels {
            Some(Downsample::new(in_channels, out_channels, stride, device))
        } else {
            None
        };

        Self {
            conv1: conv3x3(in_channels, out_channels, stride, device),
            bn1: BatchNormConfig::new(out_channels).init(device),
            conv2: conv3x3(out_channels, out_channels, 1, device),
            bn2: BatchNormConfig::new(out_channels).init(device),
            downsample,
            activation: Relu::new(),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(x.clone()),
            None => x.clone(),
        };

        let y = self.activation.forward(self.bn1.forward(self.conv1.forward(x)));
        let y = self.bn2.forward(self.conv2.forward(y));

        self.activation.forward(y + identity)
    }
}

/// Convolutional trunk: everything in ResNet-34 except the classifier.
#[derive(Module, Debug)]
pub struct ResNetTrunk<B: Backend> {
    /// Stem convolution, the only layer tied to the input channel count.
    pub(crate) conv1: Conv2d<B>,
    bn1: BatchNorm<B>,
    max_pool: MaxPool2d,
    layer1: Vec<BasicBlock<B>>,
    layer2: Vec<BasicBlock<B>>,
    layer3: Vec<BasicBlock<B>>,
    layer4: Vec<BasicBlock<B>>,
    avg_pool: AdaptiveAvgPool2d,
    activation: Relu,
}

impl<B: Backend> ResNetTrunk<B> {
    /// Create a ResNet-34 trunk for `in_channels`-channel images.
    pub fn new(in_channels: usize, device: &B::Device) -> Self {
        let conv1 = Conv2dConfig::new([in_channels, STAGE_CHANNELS[0]], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);

        let max_pool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        Self {
            conv1,
            bn1: BatchNormConfig::new(STAGE_CHANNELS[0]).init(device),
            max_pool,
            layer1: basic_stage(0, device),
            layer2: basic_stage(1, device),
            layer3: basic_stage(2, device),
            layer4: basic_stage(3, device),
            avg_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            activation: Relu::new(),
        }
    }

    /// Forward pass.
    ///
    /// Input shape: [batch, in_channels, height, width]
    /// Output shape: [batch, 512]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch, _, _, _] = images.dims();

        let x = self.activation.forward(self.bn1.forward(self.conv1.forward(images)));
        let mut x = self.max_pool.forward(x);

        for block in self
            .layer1
            .iter()
            .chain(&self.layer2)
            .chain(&self.layer3)
            .chain(&self.layer4)
        {
            x = block.forward(x);
        }

        self.avg_pool.forward(x).reshape([batch, TRUNK_FEATURES])
    }

    /// Number of input channels the stem expects.
    pub fn in_channels(&self) -> usize {
        self.conv1.weight.val().dims()[1]
    }
}

/// Image encoder: ResNet-34 trunk plus a projection to `n_out` features.
#[derive(Module, Debug)]
pub struct ImageEncoder<B: Backend> {
    pub(crate) trunk: ResNetTrunk<B>,
    fc: Linear<B>,
    n_in: usize,
    use_pretrained: bool,
    pretrained_loaded: bool,
}

impl<B: Backend> ImageEncoder<B> {
    /// Create a freshly initialised encoder.
    pub fn new(config: &ImageEncoderConfig, device: &B::Device) -> Self {
        Self {
            trunk: ResNetTrunk::new(config.n_in, device),
            fc: LinearConfig::new(TRUNK_FEATURES, config.n_out).init(device),
            n_in: config.n_in,
            use_pretrained: config.use_pretrained,
            pretrained_loaded: false,
        }
    }

    /// Load pretrained trunk weights.
    ///
    /// The stem keeps its pretrained weights only when the encoder takes
    /// native 3-channel input; otherwise the freshly initialised stem sized
    /// for `n_in` channels stays in place. The output projection is never
    /// touched.
    pub fn load_pretrained(self, record: ResNetTrunkRecord<B>) -> Result<Self> {
        if !self.use_pretrained {
            return Err(NeuralContactError::invalid_config(
                "pretrained weights given to an encoder configured with use_pretrained = false",
            ));
        }

        let keep_stem = self.config().keeps_pretrained_stem();
        let fresh_stem = self.trunk.conv1.clone();
        let mut trunk = self.trunk.load_record(record);

        if keep_stem {
            log::info!("Using fully pretrained image trunk including the stem convolution");
        } else {
            log::info!(
                "Keeping a freshly initialised {}-channel stem, pretrained stem discarded",
                self.n_in
            );
            trunk.conv1 = fresh_stem;
        }

        Ok(Self {
            trunk,
            pretrained_loaded: true,
            ..self
        })
    }

    /// True once [`Self::load_pretrained`] has replaced the random trunk.
    pub fn has_pretrained_weights(&self) -> bool {
        self.pretrained_loaded
    }

    /// Forward pass.
    ///
    /// Input shape: [batch, n_in, height, width]
    /// Output shape: [batch, n_out]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.fc.forward(self.trunk.forward(images))
    }

    /// The configuration this encoder was built with.
    pub fn config(&self) -> ImageEncoderConfig {
        let [_, n_out] = self.fc.weight.val().dims();
        ImageEncoderConfig::new()
            .with_n_in(self.n_in)
            .with_n_out(n_out)
            .with_use_pretrained(self.use_pretrained)
    }
}
