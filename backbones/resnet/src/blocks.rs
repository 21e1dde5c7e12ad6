//! ResNet block implementations.
//!
//! This module contains the building blocks for ResNet: the stems, BasicBlock, Bottleneck,
//! Downsample and LayerBlock. All 3x3 convolutions accept a dilation so late stages can trade
//! stride for receptive field.

use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d, Relu,
    },
    prelude::*,
};

fn kaiming() -> Initializer {
    Initializer::KaimingNormal {
        gain: SQRT_2,
        fan_out_only: false,
    }
}

fn conv3x3<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    dilation: usize,
    device: &Device<B>,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(dilation, dilation))
        .with_dilation([dilation, dilation])
        .with_bias(false)
        .with_initializer(kaiming())
        .init(device)
}

fn conv1x1<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    device: &Device<B>,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [1, 1])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(0, 0))
        .with_bias(false)
        .with_initializer(kaiming())
        .init(device)
}

/// Conv + BatchNorm + ReLU, the unit both stems are made of.
#[derive(Module, Debug)]
pub struct ConvBnRelu<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    relu: Relu,
}

impl<B: Backend> ConvBnRelu<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(input);
        let out = self.bn.forward(out);
        self.relu.forward(out)
    }
}

/// Input stem: one or more strided convolutions followed by a 3x3/2 max pool.
#[derive(Module, Debug)]
pub struct StemBlock<B: Backend> {
    convs: Vec<ConvBnRelu<B>>,
    maxpool: MaxPool2d,
}

impl<B: Backend> StemBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut out = input;
        for conv in &self.convs {
            out = conv.forward(out);
        }
        self.maxpool.forward(out)
    }

    /// torchvision stem: 7x7 conv, 64, stride=2, padding=3.
    pub fn standard(in_channels: usize, device: &Device<B>) -> Self {
        let conv = Conv2dConfig::new([in_channels, 64], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .with_initializer(kaiming())
            .init(device);

        Self {
            convs: vec![ConvBnRelu {
                conv,
                bn: BatchNormConfig::new(64).init(device),
                relu: Relu::new(),
            }],
            maxpool: Self::maxpool(),
        }
    }

    /// Deep stem: three 3x3 convs (64/2, 64, 128), producing 128 channels.
    pub fn deep(in_channels: usize, device: &Device<B>) -> Self {
        let convs = [(in_channels, 64, 2), (64, 64, 1), (64, 128, 1)]
            .into_iter()
            .map(|(cin, cout, stride)| ConvBnRelu {
                conv: Conv2dConfig::new([cin, cout], [3, 3])
                    .with_stride([stride, stride])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .with_bias(false)
                    .with_initializer(kaiming())
                    .init(device),
                bn: BatchNormConfig::new(cout).init(device),
                relu: Relu::new(),
            })
            .collect();

        Self {
            convs,
            maxpool: Self::maxpool(),
        }
    }

    // 3x3 maxpool, stride=2, padding=1
    fn maxpool() -> MaxPool2d {
        MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init()
    }
}

#[derive(Module, Debug)]
pub enum ResidualBlock<B: Backend> {
    /// A bottleneck residual block.
    Bottleneck(Bottleneck<B>),
    /// A basic residual block.
    Basic(BasicBlock<B>),
}

impl<B: Backend> ResidualBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Basic(block) => block.forward(input),
            Self::Bottleneck(block) => block.forward(input),
        }
    }
}

/// ResNet basic residual block implementation.
/// Derived from torchvision.models.resnet.BasicBlock
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    relu: Relu,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> BasicBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = input.clone();

        // Conv block
        let out = self.conv1.forward(input);
        let out = self.bn1.forward(out);
        let out = self.relu.forward(out);
        let out = self.conv2.forward(out);
        let out = self.bn2.forward(out);

        // Skip connection
        let out = match &self.downsample {
            Some(downsample) => out + downsample.forward(identity),
            None => out + identity,
        };

        // Activation
        self.relu.forward(out)
    }

    /// Create a new BasicBlock.
    ///
    /// `dilation[0]` applies to the (possibly strided) first 3x3 conv, `dilation[1]` to the
    /// second one.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        dilation: [usize; 2],
        device: &Device<B>,
    ) -> Self {
        let conv1 = conv3x3(in_channels, out_channels, stride, dilation[0], device);
        let bn1 = BatchNormConfig::new(out_channels).init(device);

        let conv2 = conv3x3(out_channels, out_channels, 1, dilation[1], device);
        let bn2 = BatchNormConfig::new(out_channels).init(device);

        let downsample = (stride != 1 || in_channels != out_channels)
            .then(|| Downsample::new(in_channels, out_channels, stride, device));

        Self {
            conv1,
            bn1,
            relu: Relu::new(),
            conv2,
            bn2,
            downsample,
        }
    }
}

/// ResNet bottleneck residual block implementation.
/// Derived from torchvision.models.resnet.Bottleneck
///
/// **NOTE:** Following common practice, this bottleneck block places the stride for downsampling
/// to the second 3x3 convolution while the original paper places it to the first 1x1 convolution.
/// This variant improves the accuracy and is known as ResNet V1.5.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    relu: Relu,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    conv3: Conv2d<B>,
    bn3: BatchNorm<B, 2>,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> Bottleneck<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = input.clone();

        // Conv block
        let out = self.conv1.forward(input);
        let out = self.bn1.forward(out);
        let out = self.relu.forward(out);
        let out = self.conv2.forward(out);
        let out = self.bn2.forward(out);
        let out = self.relu.forward(out);
        let out = self.conv3.forward(out);
        let out = self.bn3.forward(out);

        // Skip connection
        let out = match &self.downsample {
            Some(downsample) => out + downsample.forward(identity),
            None => out + identity,
        };

        // Activation
        self.relu.forward(out)
    }

    /// Create a new Bottleneck. Only the 3x3 conv is dilated.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        dilation: usize,
        device: &Device<B>,
    ) -> Self {
        // Intermediate output channels w/ expansion = 4
        let int_out_channels = out_channels / 4;

        let conv1 = conv1x1(in_channels, int_out_channels, 1, device);
        let bn1 = BatchNormConfig::new(int_out_channels).init(device);

        let conv2 = conv3x3(int_out_channels, int_out_channels, stride, dilation, device);
        let bn2 = BatchNormConfig::new(int_out_channels).init(device);

        let conv3 = conv1x1(int_out_channels, out_channels, 1, device);
        let bn3 = BatchNormConfig::new(out_channels).init(device);

        let downsample = (stride != 1 || in_channels != out_channels)
            .then(|| Downsample::new(in_channels, out_channels, stride, device));

        Self {
            conv1,
            bn1,
            relu: Relu::new(),
            conv2,
            bn2,
            conv3,
            bn3,
            downsample,
        }
    }
}

/// Downsample layer applies a 1x1 conv to reduce the resolution (H, W) and adjust the number of channels.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(input);
        self.bn.forward(out)
    }

    /// Create a new Downsample.
    pub fn new(in_channels: usize, out_channels: usize, stride: usize, device: &Device<B>) -> Self {
        let conv = conv1x1(in_channels, out_channels, stride, device);
        let bn = BatchNormConfig::new(out_channels).init(device);

        Self { conv, bn }
    }
}

/// Collection of sequential residual blocks.
#[derive(Module, Debug)]
pub struct LayerBlock<B: Backend> {
    blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> LayerBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut out = input;
        for block in &self.blocks {
            out = block.forward(out);
        }
        out
    }

    /// Create a new LayerBlock.
    ///
    /// With `dilation > 1` the layer keeps its resolution: the stride is dropped, the first
    /// block (the one that used to downsample) gets `dilation / 2` and the others `dilation`.
    pub fn new(
        num_blocks: usize,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        dilation: usize,
        bottleneck: bool,
        device: &Device<B>,
    ) -> Self {
        let (stride, first_dilation) = if dilation > 1 {
            (1, (dilation / 2).max(1))
        } else {
            (stride, 1)
        };

        let blocks = (0..num_blocks)
            .map(|b| {
                // First block uses the specified stride and adapts the channel count
                let (cin, stride, lead) = if b == 0 {
                    (in_channels, stride, first_dilation)
                } else {
                    (out_channels, 1, dilation)
                };

                if bottleneck {
                    ResidualBlock::Bottleneck(Bottleneck::new(
                        cin,
                        out_channels,
                        stride,
                        lead,
                        device,
                    ))
                } else {
                    ResidualBlock::Basic(BasicBlock::new(
                        cin,
                        out_channels,
                        stride,
                        [lead, dilation],
                        device,
                    ))
                }
            })
            .collect();

        Self { blocks }
    }
}
