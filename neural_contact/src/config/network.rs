//! Neural network configuration types.

use burn::config::Config;
use contact_mesh::HierarchyProvider;

use crate::error::{NeuralContactError, Result};

/// Input channel count the ResNet stem is designed (and pretrained) for.
pub const RESNET_NATIVE_CHANNELS: usize = 3;

/// Configuration for the ResNet-34 image encoder.
#[derive(Config, Debug)]
pub struct ImageEncoderConfig {
    /// Input image channels (3 for RGB, more for stacked modalities).
    #[config(default = 3)]
    pub n_in: usize,

    /// Width of the output feature vector.
    #[config(default = 256)]
    pub n_out: usize,

    /// Whether pretrained trunk weights may be loaded into the encoder.
    #[config(default = false)]
    pub use_pretrained: bool,
}

impl ImageEncoderConfig {
    /// Whether the pretrained stem convolution can be kept.
    ///
    /// Only a stem with the native channel count matches pretrained weights.
    pub fn keeps_pretrained_stem(&self) -> bool {
        self.use_pretrained && self.n_in == RESNET_NATIVE_CHANNELS
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.n_in == 0 {
            return Err(NeuralContactError::invalid_config("n_resnet_in must be positive"));
        }
        if self.n_out == 0 {
            return Err(NeuralContactError::invalid_config("n_resnet_out must be positive"));
        }
        Ok(())
    }
}

/// Configuration for the multiresolution ground-contact network.
#[derive(Config, Debug)]
pub struct GroundContactNetConfig {
    /// Offset into the hierarchy: the network runs on levels
    /// `num_downsample..=num_downsample + num_layers`.
    #[config(default = 0)]
    pub num_downsample: usize,

    /// Number of encoder/decoder downsampling stages.
    #[config(default = 5)]
    pub num_layers: usize,

    /// Image encoder input channels.
    #[config(default = 3)]
    pub n_resnet_in: usize,

    /// Image feature width, tiled onto every vertex.
    #[config(default = 256)]
    pub n_resnet_out: usize,

    /// Base graph convolution width.
    #[config(default = 256)]
    pub num_channels: usize,

    /// Whether the image encoder accepts pretrained weights.
    #[config(default = false)]
    pub use_pretrained: bool,
}

impl Default for GroundContactNetConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GroundContactNetConfig {
    /// Image encoder configuration derived from this one.
    pub fn image_encoder(&self) -> ImageEncoderConfig {
        ImageEncoderConfig::new()
            .with_n_in(self.n_resnet_in)
            .with_n_out(self.n_resnet_out)
            .with_use_pretrained(self.use_pretrained)
    }

    /// Channel width of decoder stage `stage`.
    ///
    /// Every non-terminal stage concatenates one `num_channels`-wide skip
    /// activation, so the width grows by `num_channels` per stage.
    pub fn decoder_channels(&self, stage: usize) -> usize {
        (stage + 1) * self.num_channels
    }

    /// Channel width of the decoder's terminal stage, consumed by the head.
    pub fn head_channels(&self) -> usize {
        self.decoder_channels(self.num_layers)
    }

    /// Validate the configuration on its own.
    pub fn validate(&self) -> Result<()> {
        self.image_encoder().validate()?;

        if self.num_layers == 0 {
            return Err(NeuralContactError::invalid_config("num_layers must be at least 1"));
        }
        // Residual blocks halve their width internally and group-normalise
        // with `channels / 8` groups of 8.
        if self.num_channels == 0 || self.num_channels % 16 != 0 {
            return Err(NeuralContactError::invalid_config(format!(
                "num_channels must be a positive multiple of 16, got {}",
                self.num_channels
            )));
        }

        Ok(())
    }

    /// Validate the configuration against the hierarchy it will run on.
    pub fn validate_for<H: HierarchyProvider>(&self, hierarchy: &H) -> Result<()> {
        self.validate()?;

        let num_levels = hierarchy.num_levels();
        let available = num_levels.saturating_sub(self.num_downsample);
        if available == 0 {
            return Err(NeuralContactError::invalid_config(format!(
                "num_downsample = {} leaves no levels in a hierarchy of {}",
                self.num_downsample, num_levels
            )));
        }
        if self.num_layers > available - 1 {
            return Err(NeuralContactError::invalid_config(format!(
                "num_layers = {} needs {} levels from level {}, hierarchy has {}",
                self.num_layers,
                self.num_layers + 1,
                self.num_downsample,
                available
            )));
        }

        Ok(())
    }
}
