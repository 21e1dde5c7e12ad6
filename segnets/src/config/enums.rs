//! Enumeration types used in model configurations.

use core::str::FromStr;

use burn::prelude::*;

use crate::error::SegNetError;

/// Encoder used by PSPNet.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum PspBackbone {
    /// Dilated ResNet-50 with a deep stem; auxiliary features from stage 3 (1024 channels),
    /// main features from stage 4 (2048 channels).
    ResNet50,
    /// Dilated MobileNetV2; auxiliary features from feature 14 (96 channels), main features
    /// from the last inverted residual (320 channels).
    MobileNet,
}

impl PspBackbone {
    /// Channels of the (auxiliary, main) feature maps.
    pub const fn channels(&self) -> (usize, usize) {
        match self {
            Self::ResNet50 => (1024, 2048),
            Self::MobileNet => (96, 320),
        }
    }

    /// Name accepted by [`FromStr`].
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ResNet50 => "resnet50",
            Self::MobileNet => "mobilenet",
        }
    }
}

impl FromStr for PspBackbone {
    type Err = SegNetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "resnet50" => Ok(Self::ResNet50),
            "mobilenet" | "mobilenetv2" => Ok(Self::MobileNet),
            _ => Err(SegNetError::UnsupportedBackbone {
                backbone: s.to_string(),
            }),
        }
    }
}

/// Architecture selector used by command line front-ends.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum Architecture {
    /// ENet encoder-decoder.
    ENet,
    /// Pyramid scene parsing network.
    PspNet,
    /// Multi-path refinement network.
    RefineNet,
}

impl FromStr for Architecture {
    type Err = SegNetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enet" => Ok(Self::ENet),
            "pspnet" | "psp" => Ok(Self::PspNet),
            "refinenet" | "rf" => Ok(Self::RefineNet),
            _ => Err(SegNetError::InvalidConfiguration {
                reason: format!("unknown architecture `{s}`, use enet, pspnet, refinenet"),
            }),
        }
    }
}
