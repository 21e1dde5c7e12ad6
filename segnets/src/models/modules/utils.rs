//! Small layer helpers shared by the model definitions.

use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d,
    },
    prelude::*,
};

use super::Activation;
use crate::error::{SegNetError, SegNetResult};

/// Kaiming-normal initialisation (fan-in, ReLU gain) applied to every 2D convolution.
pub fn kaiming_normal() -> Initializer {
    Initializer::KaimingNormal {
        gain: SQRT_2,
        fan_out_only: false,
    }
}

/// Geometry of a 2D convolution.
#[derive(Debug, Clone, Copy)]
pub struct ConvSpec {
    pub kernel: [usize; 2],
    pub stride: usize,
    pub padding: [usize; 2],
    pub dilation: [usize; 2],
    pub bias: bool,
}

impl ConvSpec {
    /// Square kernel, stride 1, no padding, no bias.
    pub const fn square(kernel: usize) -> Self {
        Self {
            kernel: [kernel, kernel],
            stride: 1,
            padding: [0, 0],
            dilation: [1, 1],
            bias: false,
        }
    }

    /// 3x3 kernel with "same" padding.
    pub const fn same3x3() -> Self {
        Self::square(3).with_padding([1, 1])
    }

    pub const fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub const fn with_padding(mut self, padding: [usize; 2]) -> Self {
        self.padding = padding;
        self
    }

    pub const fn with_dilation(mut self, dilation: [usize; 2]) -> Self {
        self.dilation = dilation;
        self
    }

    pub const fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    /// Build the convolution.
    pub fn init<B: Backend>(
        &self,
        in_channels: usize,
        out_channels: usize,
        device: &Device<B>,
    ) -> Conv2d<B> {
        Conv2dConfig::new([in_channels, out_channels], self.kernel)
            .with_stride([self.stride, self.stride])
            .with_padding(PaddingConfig2d::Explicit(self.padding[0], self.padding[1]))
            .with_dilation(self.dilation)
            .with_bias(self.bias)
            .with_initializer(kaiming_normal())
            .init(device)
    }
}

/// Convolution followed by batch normalisation.
#[derive(Module, Debug)]
pub struct ConvBn<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBn<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        spec: ConvSpec,
        device: &Device<B>,
    ) -> Self {
        Self {
            conv: spec.init(in_channels, out_channels, device),
            bn: BatchNormConfig::new(out_channels).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// Convolution, batch normalisation and activation.
#[derive(Module, Debug)]
pub struct ConvBnAct<B: Backend> {
    conv_bn: ConvBn<B>,
    act: Activation<B>,
}

impl<B: Backend> ConvBnAct<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        spec: ConvSpec,
        relu: bool,
        device: &Device<B>,
    ) -> Self {
        Self {
            conv_bn: ConvBn::new(in_channels, out_channels, spec, device),
            act: Activation::new(relu, device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.act.forward(self.conv_bn.forward(x))
    }
}

/// Checks that `x` is `[batch, bands, height, width]` with both spatial sizes at least `min_size`.
pub fn check_input<B: Backend>(x: &Tensor<B, 4>, bands: usize, min_size: usize) -> SegNetResult<()> {
    let [batch, channels, height, width] = x.dims();
    if batch == 0 || channels != bands || height < min_size || width < min_size {
        return Err(SegNetError::InvalidTensorShape {
            expected: format!("[batch >= 1, {bands}, height >= {min_size}, width >= {min_size}]"),
            actual: format!("{:?}", x.dims()),
        });
    }
    Ok(())
}

/// Spatial size of a 4D tensor.
pub fn spatial_size<B: Backend>(x: &Tensor<B, 4>) -> [usize; 2] {
    let [_, _, height, width] = x.dims();
    [height, width]
}
