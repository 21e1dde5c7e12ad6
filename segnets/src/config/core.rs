//! Top-level model configuration.
//!
//! [`SegNetConfig`] selects one of the architectures together with its hyper-parameters and
//! is saved to and loaded from JSON through Burn's `Config` derive.

use std::path::Path;

use burn::prelude::*;

use super::enums::Architecture;
use crate::{
    error::SegNetResult,
    models::{ENetConfig, PspNetConfig, RefineNetConfig, SegNet},
};

/// Configuration of any supported segmentation network.
#[derive(Config, Debug)]
pub enum SegNetConfig {
    /// ENet.
    ENet(ENetConfig),
    /// PSPNet.
    PspNet(PspNetConfig),
    /// RefineNet.
    RefineNet(RefineNetConfig),
}

impl SegNetConfig {
    /// Default configuration of `architecture` for `bands` input bands and `num_classes`
    /// classes.
    pub fn for_architecture(architecture: &Architecture, bands: usize, num_classes: usize) -> Self {
        match architecture {
            Architecture::ENet => Self::ENet(
                ENetConfig::new()
                    .with_bands(bands)
                    .with_num_classes(num_classes),
            ),
            Architecture::PspNet => Self::PspNet(PspNetConfig::new(num_classes).with_bands(bands)),
            Architecture::RefineNet => Self::RefineNet(
                RefineNetConfig::new()
                    .with_bands(bands)
                    .with_num_classes(num_classes),
            ),
        }
    }

    /// The selected architecture.
    pub const fn architecture(&self) -> Architecture {
        match self {
            Self::ENet(_) => Architecture::ENet,
            Self::PspNet(_) => Architecture::PspNet,
            Self::RefineNet(_) => Architecture::RefineNet,
        }
    }

    /// Number of output classes.
    pub const fn num_classes(&self) -> usize {
        match self {
            Self::ENet(config) => config.num_classes,
            Self::PspNet(config) => config.num_classes,
            Self::RefineNet(config) => config.num_classes,
        }
    }

    /// Number of input bands.
    pub const fn bands(&self) -> usize {
        match self {
            Self::ENet(config) => config.bands,
            Self::PspNet(config) => config.bands,
            Self::RefineNet(config) => config.bands,
        }
    }

    /// Validates the configuration for logical consistency.
    ///
    /// # Errors
    ///
    /// Returns an error if the wrapped configuration is invalid.
    pub fn validate(&self) -> SegNetResult<()> {
        match self {
            Self::ENet(config) => config.validate(),
            Self::PspNet(config) => config.validate(),
            Self::RefineNet(config) => config.validate(),
        }
    }

    /// Loads a configuration from a JSON file and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the configuration is
    /// invalid.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> SegNetResult<Self> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Initializes the selected network.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SegNetResult<SegNet<B>> {
        Ok(match self {
            Self::ENet(config) => SegNet::ENet(config.init(device)?),
            Self::PspNet(config) => SegNet::PspNet(config.init(device)?),
            Self::RefineNet(config) => SegNet::RefineNet(config.init(device)?),
        })
    }
}
