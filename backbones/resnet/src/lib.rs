//! ResNet encoder for the segmentation models.
//!
//! This crate provides the four residual stages of torchvision-style ResNets, adapted for dense
//! prediction: the number of input bands is configurable, the stem is either the classic 7x7
//! convolution or a deep stem of three 3x3 convolutions, and the last stages can be dilated so
//! the encoder stops at output stride 8 or 16.

use burn::prelude::*;

mod blocks;
pub use blocks::*;

// ResNet residual layer block configs
const RESNET18_BLOCKS: [usize; 4] = [2, 2, 2, 2];
const RESNET34_BLOCKS: [usize; 4] = [3, 4, 6, 3];
const RESNET50_BLOCKS: [usize; 4] = [3, 4, 6, 3];
const RESNET101_BLOCKS: [usize; 4] = [3, 4, 23, 3];
const RESNET152_BLOCKS: [usize; 4] = [3, 8, 36, 3];

/// Stage widths before block expansion.
const STAGE_PLANES: [usize; 4] = [64, 128, 256, 512];

/// ResNet depth variants.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum ResNetDepth {
    /// ResNet-18 (basic blocks)
    ResNet18,
    /// ResNet-34 (basic blocks)
    ResNet34,
    /// ResNet-50 (bottlenecks)
    ResNet50,
    /// ResNet-101 (bottlenecks)
    ResNet101,
    /// ResNet-152 (bottlenecks)
    ResNet152,
}

impl ResNetDepth {
    /// Number of residual blocks in each of the four stages.
    pub const fn blocks(&self) -> [usize; 4] {
        match self {
            Self::ResNet18 => RESNET18_BLOCKS,
            Self::ResNet34 => RESNET34_BLOCKS,
            Self::ResNet50 => RESNET50_BLOCKS,
            Self::ResNet101 => RESNET101_BLOCKS,
            Self::ResNet152 => RESNET152_BLOCKS,
        }
    }

    /// Channel expansion of the residual block (1 for basic, 4 for bottleneck).
    pub const fn expansion(&self) -> usize {
        match self {
            Self::ResNet18 | Self::ResNet34 => 1,
            Self::ResNet50 | Self::ResNet101 | Self::ResNet152 => 4,
        }
    }

    /// Output channels of the four stages.
    pub const fn stage_channels(&self) -> [usize; 4] {
        let e = self.expansion();
        [
            STAGE_PLANES[0] * e,
            STAGE_PLANES[1] * e,
            STAGE_PLANES[2] * e,
            STAGE_PLANES[3] * e,
        ]
    }
}

/// Input stem variants.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum Stem {
    /// 7x7/2 convolution with 64 channels.
    Standard,
    /// Three 3x3 convolutions (64/2, 64, 128).
    Deep,
}

/// Ratio between input resolution and the resolution of the last stage.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum OutputStride {
    /// Stages 3 and 4 dilated by 2 and 4.
    Os8,
    /// Stage 4 dilated by 2.
    Os16,
    /// Plain ResNet.
    Os32,
}

impl OutputStride {
    /// Parse a numeric stride; only 8, 16 and 32 are supported.
    pub const fn from_factor(factor: usize) -> Option<Self> {
        match factor {
            8 => Some(Self::Os8),
            16 => Some(Self::Os16),
            32 => Some(Self::Os32),
            _ => None,
        }
    }

    /// The numeric stride.
    pub const fn factor(&self) -> usize {
        match self {
            Self::Os8 => 8,
            Self::Os16 => 16,
            Self::Os32 => 32,
        }
    }

    /// Dilation of stages 1 to 4.
    const fn dilations(&self) -> [usize; 4] {
        match self {
            Self::Os8 => [1, 1, 2, 4],
            Self::Os16 => [1, 1, 1, 2],
            Self::Os32 => [1, 1, 1, 1],
        }
    }
}

/// ResNet configuration
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Network depth
    #[config(default = "ResNetDepth::ResNet50")]
    pub depth: ResNetDepth,
    /// Number of input bands
    #[config(default = "3")]
    pub in_channels: usize,
    /// Input stem
    #[config(default = "Stem::Standard")]
    pub stem: Stem,
    /// Output stride of the last stage
    #[config(default = "OutputStride::Os32")]
    pub output_stride: OutputStride,
}

impl ResNetConfig {
    /// ResNet50 configuration
    pub fn resnet50() -> Self {
        Self::new().with_depth(ResNetDepth::ResNet50)
    }

    /// Initialize ResNet model
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNetBackbone<B> {
        let (stem, stem_channels) = match self.stem {
            Stem::Standard => (StemBlock::standard(self.in_channels, device), 64),
            Stem::Deep => (StemBlock::deep(self.in_channels, device), 128),
        };

        let blocks = self.depth.blocks();
        let channels = self.depth.stage_channels();
        let dilations = self.output_stride.dilations();
        let bottleneck = self.depth.expansion() > 1;
        let strides = [1, 2, 2, 2];

        let layer = |i: usize| {
            let in_channels = if i == 0 { stem_channels } else { channels[i - 1] };
            LayerBlock::new(
                blocks[i],
                in_channels,
                channels[i],
                strides[i],
                dilations[i],
                bottleneck,
                device,
            )
        };

        ResNetBackbone {
            stem,
            layer1: layer(0),
            layer2: layer(1),
            layer3: layer(2),
            layer4: layer(3),
            channels,
        }
    }
}

/// ResNet backbone implementation.
///
/// This provides the 4 feature levels (layer1-4) consumed by the segmentation heads.
/// Derived from torchvision.models.resnet.ResNet
#[derive(Module, Debug)]
pub struct ResNetBackbone<B: Backend> {
    // stem: conv(s) + bn + relu + maxpool
    pub stem: StemBlock<B>,

    // First feature level: layer1 (1/4 scale)
    pub layer1: LayerBlock<B>,

    // Second feature level: layer2 (1/8 scale)
    pub layer2: LayerBlock<B>,

    // Third feature level: layer3 (1/16 scale unless dilated)
    pub layer3: LayerBlock<B>,

    // Fourth feature level: layer4 (1/32 scale unless dilated)
    pub layer4: LayerBlock<B>,

    channels: [usize; 4],
}

impl<B: Backend> ResNetBackbone<B> {
    /// Forward pass that returns the 4 feature levels.
    pub fn forward(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 4] {
        let x = self.stem.forward(input);

        let l1 = self.layer1.forward(x);
        let l2 = self.layer2.forward(l1.clone());
        let l3 = self.layer3.forward(l2.clone());
        let l4 = self.layer4.forward(l3.clone());

        [l1, l2, l3, l4]
    }

    /// Output channels of the four feature levels.
    pub fn output_channels(&self) -> [usize; 4] {
        self.channels
    }

    /// Create ResNet-18 backbone.
    pub fn resnet18(device: &Device<B>) -> Self {
        ResNetConfig::new()
            .with_depth(ResNetDepth::ResNet18)
            .init(device)
    }

    /// Create ResNet-50 backbone.
    pub fn resnet50(device: &Device<B>) -> Self {
        ResNetConfig::resnet50().init(device)
    }
}
