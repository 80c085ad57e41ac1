//! The full ground-contact network.

use burn::module::Module;
use burn::prelude::*;
use contact_mesh::HierarchyProvider;

use crate::config::GroundContactNetConfig;
use crate::error::{NeuralContactError, Result};
use crate::mesh::MeshOperators;
use crate::nn::{
    ContactHead, ImageEncoder, InputFusion, MultiresDecoder, MultiresEncoder, ResNetTrunkRecord,
};

/// Outputs of a forward pass.
#[derive(Debug, Clone)]
pub struct ContactOutput<B: Backend> {
    /// Contact logits per base-level vertex, `[batch, 2, n_base]`.
    pub ground_contact: Tensor<B, 3>,
    /// Decoder stage outputs, coarse to fine, `num_layers + 1` entries.
    /// Entry `i` is `[batch, (i + 1) * num_channels, n_{num_layers - i}]`.
    pub output_list: Vec<Tensor<B, 3>>,
}

/// Image to per-vertex ground contact over a multiresolution mesh.
///
/// ```text
/// image ─▶ ResNet ─▶ tile over vertices ─┐
/// template vertices ─────────────────────┴▶ fusion ─▶ encoder ─▶ decoder ─▶ head
///                                                       │  skips  ▲
///                                                       └─────────┘
/// ```
#[derive(Module, Debug)]
pub struct GroundContactNet<B: Backend> {
    image_encoder: ImageEncoder<B>,
    operators: MeshOperators<B>,
    fusion: InputFusion<B>,
    encoder: MultiresEncoder<B>,
    decoder: MultiresDecoder<B>,
    head: ContactHead<B>,
    num_channels: usize,
    n_resnet_out: usize,
}

impl GroundContactNetConfig {
    /// Initialize a network over `hierarchy`.
    pub fn init<B: Backend, H: HierarchyProvider>(
        &self,
        hierarchy: &H,
        device: &B::Device,
    ) -> Result<GroundContactNet<B>> {
        GroundContactNet::new(self, hierarchy, device)
    }
}

impl<B: Backend> GroundContactNet<B> {
    /// Build a network from configuration.
    ///
    /// Fails with [`NeuralContactError::InvalidConfig`] when the hierarchy
    /// has too few levels for `num_downsample + num_layers`.
    pub fn new<H: HierarchyProvider>(
        config: &GroundContactNetConfig,
        hierarchy: &H,
        device: &B::Device,
    ) -> Result<Self> {
        config.validate_for(hierarchy)?;

        let channels = config.num_channels;
        let operators = MeshOperators::new(hierarchy, config.num_downsample, config.num_layers, device)?;

        let model = Self {
            image_encoder: ImageEncoder::new(&config.image_encoder(), device),
            fusion: InputFusion::new(config.n_resnet_out, channels, &operators, device)?,
            encoder: MultiresEncoder::new(channels, &operators, device)?,
            decoder: MultiresDecoder::new(channels, &operators, device)?,
            head: ContactHead::new(config.head_channels(), &operators, device)?,
            operators,
            num_channels: channels,
            n_resnet_out: config.n_resnet_out,
        };

        log::info!(
            "Built ground-contact network: levels {}..={}, {} base vertices, {} channels, {} parameters",
            config.num_downsample,
            config.num_downsample + config.num_layers,
            model.base_vertices(),
            channels,
            model.num_params()
        );
        if config.use_pretrained {
            log::warn!(
                "use_pretrained is set but the image trunk is randomly initialised until load_pretrained_backbone is called"
            );
        }

        Ok(model)
    }

    /// Forward pass.
    ///
    /// Input shape: [batch, n_resnet_in, height, width]
    ///
    /// Panics inside the backend if the channel count does not match the
    /// encoder; use [`Self::try_forward`] to get an error instead.
    pub fn forward(&self, images: Tensor<B, 4>) -> ContactOutput<B> {
        let [batch, _, _, _] = images.dims();

        let image_features = self.image_encoder.forward(images);
        let vertices = self.operators.reference_vertices(batch);
        let fused = self.fusion.forward(vertices, image_features);

        let encoded = self.encoder.forward(fused, &self.operators);
        let decoded = self
            .decoder
            .forward(encoded.bottleneck, encoded.skips, &self.operators);

        ContactOutput {
            ground_contact: self.head.forward(decoded.features),
            output_list: decoded.output_list,
        }
    }

    /// Forward pass that checks the image batch first.
    pub fn try_forward(&self, images: Tensor<B, 4>) -> Result<ContactOutput<B>> {
        let dims = images.dims();
        let [batch, channels, height, width] = dims;
        let n_in = self.n_resnet_in();

        if channels != n_in || batch == 0 || height == 0 || width == 0 {
            return Err(NeuralContactError::ShapeMismatch {
                expected: vec![batch.max(1), n_in, height.max(1), width.max(1)],
                got: dims.to_vec(),
            });
        }

        Ok(self.forward(images))
    }

    /// Load pretrained ResNet trunk weights into the image encoder.
    pub fn load_pretrained_backbone(self, record: ResNetTrunkRecord<B>) -> Result<Self> {
        let image_encoder = self.image_encoder.load_pretrained(record)?;
        Ok(Self {
            image_encoder,
            ..self
        })
    }

    /// True once pretrained trunk weights have been loaded.
    pub fn has_pretrained_backbone(&self) -> bool {
        self.image_encoder.has_pretrained_weights()
    }

    /// The configuration this network was built with.
    pub fn config(&self) -> GroundContactNetConfig {
        let encoder = self.image_encoder.config();
        GroundContactNetConfig::new()
            .with_num_downsample(self.num_downsample())
            .with_num_layers(self.num_layers())
            .with_n_resnet_in(encoder.n_in)
            .with_n_resnet_out(self.n_resnet_out)
            .with_num_channels(self.num_channels)
            .with_use_pretrained(encoder.use_pretrained)
    }

    /// Number of encoder/decoder downsampling stages.
    pub fn num_layers(&self) -> usize {
        self.encoder.num_layers()
    }

    /// First hierarchy level the network runs on.
    pub fn num_downsample(&self) -> usize {
        self.operators.base_level()
    }

    /// Base graph convolution width.
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Image encoder input channels.
    pub fn n_resnet_in(&self) -> usize {
        self.image_encoder.config().n_in
    }

    /// Output width of decoder stage `stage`, `None` past the terminal stage.
    pub fn decoder_channels(&self, stage: usize) -> Option<usize> {
        self.decoder.stage_channels(stage)
    }

    /// Vertices at the level the head predicts on.
    pub fn base_vertices(&self) -> usize {
        self.operators.base_vertices()
    }

    /// Shared mesh operators.
    pub fn operators(&self) -> &MeshOperators<B> {
        &self.operators
    }
}
