//! Configuration module for the segmentation models.
//!
//! - `core`: the top-level [`SegNetConfig`] selecting one of the architectures
//! - `enums`: enumeration types used in configurations

pub mod core;
pub mod enums;

pub use self::core::SegNetConfig;
pub use enums::{Architecture, PspBackbone};
