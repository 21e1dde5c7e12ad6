//! MobileNetV2 building blocks.

use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d,
    },
    prelude::*,
};
use burn_extra_ops::Relu6;

fn kaiming() -> Initializer {
    Initializer::KaimingNormal {
        gain: SQRT_2,
        fan_out_only: false,
    }
}

/// Conv + BatchNorm + ReLU6.
#[derive(Module, Debug)]
pub struct ConvBnRelu6<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    act: Relu6,
}

impl<B: Backend> ConvBnRelu6<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(input);
        let out = self.bn.forward(out);
        self.act.forward(out)
    }

    /// 3x3 convolution with padding 1, used as the network stem.
    pub fn stem(in_channels: usize, out_channels: usize, stride: usize, device: &Device<B>) -> Self {
        Self::new(in_channels, out_channels, 3, stride, 1, 1, device)
    }

    fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        dilation: usize,
        groups: usize,
        device: &Device<B>,
    ) -> Self {
        let padding = dilation * (kernel_size / 2);
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_dilation([dilation, dilation])
            .with_groups(groups)
            .with_bias(false)
            .with_initializer(kaiming())
            .init(device);

        Self {
            conv,
            bn: BatchNormConfig::new(out_channels).init(device),
            act: Relu6::new(),
        }
    }
}

/// Inverted residual block: 1x1 expansion, 3x3 depthwise, 1x1 linear projection.
#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    expand: Option<ConvBnRelu6<B>>,
    depthwise: ConvBnRelu6<B>,
    project: Conv2d<B>,
    project_bn: BatchNorm<B, 2>,
    use_residual: bool,
}

impl<B: Backend> InvertedResidual<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = match &self.expand {
            Some(expand) => expand.forward(input.clone()),
            None => input.clone(),
        };
        let out = self.depthwise.forward(out);
        let out = self.project.forward(out);
        let out = self.project_bn.forward(out);

        if self.use_residual {
            input + out
        } else {
            out
        }
    }

    /// Whether the block adds its input to its output.
    pub const fn has_residual(&self) -> bool {
        self.use_residual
    }

    /// Create a new InvertedResidual.
    ///
    /// `dilate > 1` rewrites the depthwise conv for dense prediction: a stride-2 block becomes
    /// stride 1 with dilation `dilate / 2`, any other block gets dilation `dilate`. The residual
    /// connection is decided from the nominal stride, before that rewrite.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        expand_ratio: usize,
        dilate: usize,
        device: &Device<B>,
    ) -> Self {
        let hidden = in_channels * expand_ratio;
        let use_residual = stride == 1 && in_channels == out_channels;

        let (stride, dilation) = match (dilate, stride) {
            (1, stride) => (stride, 1),
            (d, 2) => (1, (d / 2).max(1)),
            (d, stride) => (stride, d),
        };

        let expand = (expand_ratio != 1)
            .then(|| ConvBnRelu6::new(in_channels, hidden, 1, 1, 1, 1, device));
        let depthwise = ConvBnRelu6::new(hidden, hidden, 3, stride, dilation, hidden, device);

        // pw-linear
        let project = Conv2dConfig::new([hidden, out_channels], [1, 1])
            .with_bias(false)
            .with_initializer(kaiming())
            .init(device);
        let project_bn = BatchNormConfig::new(out_channels).init(device);

        Self {
            expand,
            depthwise,
            project,
            project_bn,
            use_residual,
        }
    }
}
