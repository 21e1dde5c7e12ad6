//! # Model Architectures
//!
//! - `enet`: ENet encoder-decoder with pooling-index unpooling.
//! - `pspnet`: PSPNet with a pyramid pooling head on a dilated ResNet-50 or MobileNetV2.
//! - `refinenet`: RefineNet multi-path refinement on a ResNet encoder.
//! - `segnet`: a module enum over the three networks.
//! - `modules`: building blocks shared by the networks.

pub mod enet;
pub mod modules;
pub mod pspnet;
pub mod refinenet;
pub mod segnet;

pub use enet::{ENet, ENetConfig, ENetRecord, ENET_MIN_INPUT_SIZE};
pub use pspnet::{PspNet, PspNetConfig, PspNetOutput, PspNetRecord, PSPNET_MIN_INPUT_SIZE};
pub use refinenet::{RefineNet, RefineNetConfig, RefineNetRecord, REFINENET_MIN_INPUT_SIZE};
pub use segnet::{SegNet, SegNetRecord, SegmentationOutput};
