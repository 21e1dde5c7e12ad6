//! Backbone implementations for the segmentation models
//!
//! This crate provides a unified interface over the encoders used by the segmentation heads:
//! ResNet (standard or deep stem, optionally dilated) and MobileNetV2 (optionally dilated).

use burn::prelude::*;

pub use mobilenet_v2::{
    DownsampleFactor, MobileNetV2Backbone, MobileNetV2Config, MOBILENET_V2_CHANNELS,
};
pub use resnet::{OutputStride, ResNetBackbone, ResNetConfig, ResNetDepth, Stem};

/// Unified backbone trait
pub trait Backbone<B: Backend> {
    /// Forward pass through the backbone
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape `[batch_size, channels, height, width]`
    ///
    /// # Returns
    /// Array of 4 feature maps at different scales, finest first
    fn forward(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 4];

    /// Get output channels for each scale
    fn output_channels(&self) -> [usize; 4];
}

/// Implement Backbone trait for ResNet
impl<B: Backend> Backbone<B> for ResNetBackbone<B> {
    fn forward(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 4] {
        self.forward(input)
    }

    fn output_channels(&self) -> [usize; 4] {
        self.output_channels()
    }
}

/// Implement Backbone trait for MobileNetV2
impl<B: Backend> Backbone<B> for MobileNetV2Backbone<B> {
    fn forward(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 4] {
        self.forward(input)
    }

    fn output_channels(&self) -> [usize; 4] {
        self.output_channels()
    }
}

/// Enumeration of supported backbone types together with their configuration
#[derive(Debug, Clone)]
pub enum BackboneType {
    /// ResNet backbone
    ResNet(ResNetConfig),
    /// MobileNetV2 backbone
    MobileNetV2(MobileNetV2Config),
}

/// Enum to wrap different backbone implementations
#[derive(Module, Debug)]
pub enum BackboneWrapper<B: Backend> {
    /// ResNet backbone
    ResNet(ResNetBackbone<B>),
    /// MobileNetV2 backbone
    MobileNetV2(MobileNetV2Backbone<B>),
}

impl<B: Backend> Backbone<B> for BackboneWrapper<B> {
    fn forward(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 4] {
        match self {
            Self::ResNet(backbone) => backbone.forward(input),
            Self::MobileNetV2(backbone) => backbone.forward(input),
        }
    }

    fn output_channels(&self) -> [usize; 4] {
        match self {
            Self::ResNet(backbone) => backbone.output_channels(),
            Self::MobileNetV2(backbone) => backbone.output_channels(),
        }
    }
}

/// Factory function to create backbones
pub fn create_backbone<B: Backend>(
    backbone_type: &BackboneType,
    device: &Device<B>,
) -> BackboneWrapper<B> {
    match backbone_type {
        BackboneType::ResNet(config) => BackboneWrapper::ResNet(config.init(device)),
        BackboneType::MobileNetV2(config) => BackboneWrapper::MobileNetV2(config.init(device)),
    }
}
