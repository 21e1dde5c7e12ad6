//! # Output-Sized Transposed Convolution
//!
//! A strided transposed convolution can map several input sizes onto the same output size
//! and, conversely, one input size onto several valid output sizes. Burn fixes the extra
//! output padding when the layer is built; decoders that must reproduce the exact encoder
//! resolution need to choose it per call. This module keeps its own parameters and calls the
//! functional `conv_transpose2d` with the padding derived from the requested output size.

use burn::{
    module::Param,
    nn::Initializer,
    prelude::*,
    tensor::{module::conv_transpose2d, ops::ConvTransposeOptions},
};

/// Configuration for the `SizedConvTranspose2d` module.
#[derive(Config, Debug)]
pub struct SizedConvTranspose2dConfig {
    /// Number of input and output channels.
    pub channels: [usize; 2],
    /// Kernel size.
    pub kernel_size: [usize; 2],
    /// Stride.
    #[config(default = "[1, 1]")]
    pub stride: [usize; 2],
    /// Implicit zero padding removed from both sides of the output.
    #[config(default = "[0, 0]")]
    pub padding: [usize; 2],
    /// Kernel dilation.
    #[config(default = "[1, 1]")]
    pub dilation: [usize; 2],
    /// Whether to learn an additive bias.
    #[config(default = "true")]
    pub bias: bool,
    /// Weight initializer.
    #[config(default = "Initializer::KaimingUniform{gain:1.0/3.0f64.sqrt(),fan_out_only:false}")]
    pub initializer: Initializer,
}

impl SizedConvTranspose2dConfig {
    /// Initializes a new `SizedConvTranspose2d` module.
    pub fn init<B: Backend>(&self, device: &B::Device) -> SizedConvTranspose2d<B> {
        let [channels_in, channels_out] = self.channels;
        let [k_h, k_w] = self.kernel_size;

        let fan_in = channels_out * k_h * k_w;
        let fan_out = channels_in * k_h * k_w;

        let weight = self.initializer.init_with(
            [channels_in, channels_out, k_h, k_w],
            Some(fan_in),
            Some(fan_out),
            device,
        );
        let bias = self
            .bias
            .then(|| self.initializer.init_with([channels_out], Some(fan_in), Some(fan_out), device));

        SizedConvTranspose2d {
            weight,
            bias,
            kernel_size: self.kernel_size,
            stride: self.stride,
            padding: self.padding,
            dilation: self.dilation,
        }
    }
}

/// Transposed 2D convolution whose output padding is resolved at call time.
#[derive(Module, Debug)]
pub struct SizedConvTranspose2d<B: Backend> {
    /// Weight of shape `[channels_in, channels_out, kernel_h, kernel_w]`.
    pub weight: Param<Tensor<B, 4>>,
    /// Optional bias of shape `[channels_out]`.
    pub bias: Option<Param<Tensor<B, 1>>>,
    kernel_size: [usize; 2],
    stride: [usize; 2],
    padding: [usize; 2],
    dilation: [usize; 2],
}

impl<B: Backend> SizedConvTranspose2d<B> {
    /// Forward pass producing the smallest output size (no extra output padding).
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.apply(x, [0, 0])
    }

    /// Forward pass producing `output_size`.
    ///
    /// Valid targets lie in `[base, base + max(stride, dilation) - 1]` per axis, where `base`
    /// is [`Self::min_output_size`]; other targets are clamped into that range.
    ///
    /// # Shapes
    /// - x: `[batch_size, channels_in, height, width]`
    /// - output: `[batch_size, channels_out, output_size[0], output_size[1]]`
    pub fn forward_sized(&self, x: Tensor<B, 4>, output_size: [usize; 2]) -> Tensor<B, 4> {
        let [_, _, height, width] = x.dims();
        let padding_out = [
            self.padding_out(0, height, output_size[0]),
            self.padding_out(1, width, output_size[1]),
        ];
        self.apply(x, padding_out)
    }

    /// Output size for the given input size when no extra output padding is used.
    pub fn min_output_size(&self, input_size: [usize; 2]) -> [usize; 2] {
        [
            self.base_len(0, input_size[0]),
            self.base_len(1, input_size[1]),
        ]
    }

    fn base_len(&self, axis: usize, input: usize) -> usize {
        let span = input.saturating_sub(1) * self.stride[axis]
            + self.dilation[axis] * (self.kernel_size[axis] - 1)
            + 1;
        span.saturating_sub(2 * self.padding[axis])
    }

    fn padding_out(&self, axis: usize, input: usize, target: usize) -> usize {
        let max_padding = self.stride[axis].max(self.dilation[axis]) - 1;
        target
            .saturating_sub(self.base_len(axis, input))
            .min(max_padding)
    }

    fn apply(&self, x: Tensor<B, 4>, padding_out: [usize; 2]) -> Tensor<B, 4> {
        conv_transpose2d(
            x,
            self.weight.val(),
            self.bias.as_ref().map(|bias| bias.val()),
            ConvTransposeOptions::new(self.stride, self.padding, padding_out, self.dilation, 1),
        )
    }
}
