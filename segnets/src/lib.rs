//! # Semantic Segmentation Networks for Multi-Band Imagery
//!
//! Burn implementations of three segmentation architectures that accept an arbitrary number
//! of input bands (for example RGB plus near-infrared or SAR channels):
//!
//! - [`ENet`]: real-time encoder-decoder with pooling-index unpooling.
//! - [`PspNet`]: pyramid pooling head on a dilated ResNet-50 or MobileNetV2 encoder, with an
//!   optional auxiliary classifier.
//! - [`RefineNet`]: multi-path refinement on a ResNet-18 to ResNet-152 encoder.
//!
//! Every network maps `[batch_size, bands, height, width]` to per-pixel class logits
//! `[batch_size, num_classes, height, width]`. [`SegNetConfig`] selects a network at runtime
//! and builds a [`SegNet`] module.
//!
//! ```no_run
//! use burn::backend::NdArray;
//! use burn::prelude::*;
//! use segnets_burn::{PspBackbone, PspNetConfig, SegNetConfig};
//!
//! let device = Default::default();
//! let config = SegNetConfig::PspNet(
//!     PspNetConfig::new(3).with_backbone(PspBackbone::MobileNet),
//! );
//! let model = config.init::<NdArray>(&device)?;
//!
//! let x = Tensor::<NdArray, 4>::zeros([1, 6, 256, 256], &device);
//! let output = model.forward(x)?;
//! assert_eq!(output.logits.dims(), [1, 3, 256, 256]);
//! # Ok::<(), segnets_burn::SegNetError>(())
//! ```

mod config;
mod error;
mod models;
mod tests;

pub use config::{Architecture, PspBackbone, SegNetConfig};
pub use error::{SegNetError, SegNetResult};
pub use models::{
    modules, ENet, ENetConfig, ENetRecord, PspNet, PspNetConfig, PspNetOutput, PspNetRecord,
    RefineNet, RefineNetConfig, RefineNetRecord, SegNet, SegNetRecord, SegmentationOutput,
    ENET_MIN_INPUT_SIZE, PSPNET_MIN_INPUT_SIZE, REFINENET_MIN_INPUT_SIZE,
};

pub use backbones::ResNetDepth;
