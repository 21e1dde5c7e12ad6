//! # ENet Building Blocks
//!
//! The initial block and the three bottleneck flavours of ENet. Every bottleneck is a residual
//! unit: a cheap main branch (identity, max-pool or max-unpool) summed with an extension branch
//! of 1x1 projection, a spatial convolution and 1x1 expansion followed by spatial dropout.

use burn::{
    nn::{
        conv::Conv2d,
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    prelude::*,
};
use burn_extra_ops::{
    max_pool2d_indexed, max_unpool2d, Dropout2d, Dropout2dConfig, SizedConvTranspose2d,
    SizedConvTranspose2dConfig,
};

use super::{spatial_size, Activation, ConvBn, ConvBnAct, ConvSpec};
use crate::error::{SegNetError, SegNetResult};

fn check_internal_ratio(internal_ratio: usize, channels: usize) -> SegNetResult<()> {
    if internal_ratio <= 1 || internal_ratio > channels {
        return Err(SegNetError::InvalidConfiguration {
            reason: format!(
                "internal_ratio must lie in (1, {channels}], got {internal_ratio}"
            ),
        });
    }
    Ok(())
}

/// Argmax positions of an encoder max-pool together with the size of the pooled input.
#[derive(Debug, Clone)]
pub struct PoolingIndices<B: Backend> {
    pub indices: Tensor<B, 4, Int>,
    pub input_size: [usize; 2],
}

/// Configuration for [`InitialBlock`].
#[derive(Config, Debug)]
pub struct InitialBlockConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    #[config(default = "false")]
    pub bias: bool,
    #[config(default = "true")]
    pub relu: bool,
}

impl InitialBlockConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SegNetResult<InitialBlock<B>> {
        if self.in_channels == 0 || self.in_channels >= self.out_channels {
            return Err(SegNetError::InvalidConfiguration {
                reason: format!(
                    "initial block needs 0 < in_channels < out_channels, got {} -> {}",
                    self.in_channels, self.out_channels
                ),
            });
        }

        Ok(InitialBlock {
            main_branch: ConvSpec::same3x3()
                .with_stride(2)
                .with_bias(self.bias)
                .init(self.in_channels, self.out_channels - self.in_channels, device),
            ext_branch: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            batch_norm: BatchNormConfig::new(self.out_channels).init(device),
            activation: Activation::new(self.relu, device),
        })
    }
}

/// Halves the resolution by concatenating a strided convolution with a max-pool of the input.
#[derive(Module, Debug)]
pub struct InitialBlock<B: Backend> {
    main_branch: Conv2d<B>,
    ext_branch: MaxPool2d,
    batch_norm: BatchNorm<B, 2>,
    activation: Activation<B>,
}

impl<B: Backend> InitialBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let main = self.main_branch.forward(x.clone());
        let ext = self.ext_branch.forward(x);
        let out = Tensor::cat(vec![main, ext], 1);
        self.activation.forward(self.batch_norm.forward(out))
    }
}

/// Configuration for [`RegularBottleneck`].
#[derive(Config, Debug)]
pub struct RegularBottleneckConfig {
    pub channels: usize,
    #[config(default = "4")]
    pub internal_ratio: usize,
    #[config(default = "3")]
    pub kernel_size: usize,
    #[config(default = "0")]
    pub padding: usize,
    #[config(default = "1")]
    pub dilation: usize,
    /// Factorise the spatial convolution into `k x 1` followed by `1 x k`.
    #[config(default = "false")]
    pub asymmetric: bool,
    #[config(default = "0.0")]
    pub dropout: f64,
    #[config(default = "false")]
    pub bias: bool,
    #[config(default = "true")]
    pub relu: bool,
}

impl RegularBottleneckConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SegNetResult<RegularBottleneck<B>> {
        check_internal_ratio(self.internal_ratio, self.channels)?;
        let internal = self.channels / self.internal_ratio;
        let k = self.kernel_size;
        let p = self.padding;
        let d = self.dilation;

        let ext_conv2 = if self.asymmetric {
            let vertical = ConvSpec {
                kernel: [k, 1],
                stride: 1,
                padding: [p, 0],
                dilation: [d, d],
                bias: self.bias,
            };
            let horizontal = ConvSpec {
                kernel: [1, k],
                padding: [0, p],
                ..vertical
            };
            vec![
                ConvBnAct::new(internal, internal, vertical, self.relu, device),
                ConvBnAct::new(internal, internal, horizontal, self.relu, device),
            ]
        } else {
            let spec = ConvSpec::square(k)
                .with_padding([p, p])
                .with_dilation([d, d])
                .with_bias(self.bias);
            vec![ConvBnAct::new(internal, internal, spec, self.relu, device)]
        };

        let pointwise = ConvSpec::square(1).with_bias(self.bias);
        Ok(RegularBottleneck {
            ext_conv1: ConvBnAct::new(self.channels, internal, pointwise, self.relu, device),
            ext_conv2,
            ext_conv3: ConvBnAct::new(internal, self.channels, pointwise, self.relu, device),
            ext_regul: Dropout2dConfig::new().with_prob(self.dropout).init(),
            out_activation: Activation::new(self.relu, device),
        })
    }
}

/// Resolution-preserving residual bottleneck, optionally dilated or asymmetric.
#[derive(Module, Debug)]
pub struct RegularBottleneck<B: Backend> {
    ext_conv1: ConvBnAct<B>,
    ext_conv2: Vec<ConvBnAct<B>>,
    ext_conv3: ConvBnAct<B>,
    ext_regul: Dropout2d,
    out_activation: Activation<B>,
}

impl<B: Backend> RegularBottleneck<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut ext = self.ext_conv1.forward(x.clone());
        for conv in &self.ext_conv2 {
            ext = conv.forward(ext);
        }
        let ext = self.ext_regul.forward(self.ext_conv3.forward(ext));

        self.out_activation.forward(x + ext)
    }
}

/// Configuration for [`DownsamplingBottleneck`].
#[derive(Config, Debug)]
pub struct DownsamplingBottleneckConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    #[config(default = "4")]
    pub internal_ratio: usize,
    /// Keep the max-pool argmax so a decoder stage can unpool.
    #[config(default = "false")]
    pub return_indices: bool,
    #[config(default = "0.0")]
    pub dropout: f64,
    #[config(default = "false")]
    pub bias: bool,
    #[config(default = "true")]
    pub relu: bool,
}

impl DownsamplingBottleneckConfig {
    pub fn init<B: Backend>(
        &self,
        device: &Device<B>,
    ) -> SegNetResult<DownsamplingBottleneck<B>> {
        check_internal_ratio(self.internal_ratio, self.in_channels)?;
        if self.out_channels < self.in_channels {
            return Err(SegNetError::InvalidConfiguration {
                reason: format!(
                    "downsampling bottleneck cannot reduce channels ({} -> {})",
                    self.in_channels, self.out_channels
                ),
            });
        }
        let internal = self.in_channels / self.internal_ratio;

        Ok(DownsamplingBottleneck {
            ext_conv1: ConvBnAct::new(
                self.in_channels,
                internal,
                ConvSpec::square(2).with_stride(2).with_bias(self.bias),
                self.relu,
                device,
            ),
            ext_conv2: ConvBnAct::new(
                internal,
                internal,
                ConvSpec::same3x3().with_bias(self.bias),
                self.relu,
                device,
            ),
            ext_conv3: ConvBnAct::new(
                internal,
                self.out_channels,
                ConvSpec::square(1).with_bias(self.bias),
                self.relu,
                device,
            ),
            ext_regul: Dropout2dConfig::new().with_prob(self.dropout).init(),
            out_activation: Activation::new(self.relu, device),
            return_indices: self.return_indices,
        })
    }
}

/// Halves the resolution; the max-pooled main branch is zero-padded up to the output channels.
#[derive(Module, Debug)]
pub struct DownsamplingBottleneck<B: Backend> {
    ext_conv1: ConvBnAct<B>,
    ext_conv2: ConvBnAct<B>,
    ext_conv3: ConvBnAct<B>,
    ext_regul: Dropout2d,
    out_activation: Activation<B>,
    return_indices: bool,
}

impl<B: Backend> DownsamplingBottleneck<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Option<PoolingIndices<B>>) {
        let input_size = spatial_size(&x);
        let (main, indices) = max_pool2d_indexed(x.clone(), [2, 2]);

        let ext = self.ext_conv1.forward(x);
        let ext = self.ext_conv2.forward(ext);
        let ext = self.ext_conv3.forward(ext);
        let ext = self.ext_regul.forward(ext);

        let [batch, ext_channels, height, width] = ext.dims();
        let main_channels = main.dims()[1];
        let main = if ext_channels > main_channels {
            let padding = Tensor::zeros(
                [batch, ext_channels - main_channels, height, width],
                &main.device(),
            );
            Tensor::cat(vec![main, padding], 1)
        } else {
            main
        };

        let out = self.out_activation.forward(main + ext);
        let indices = self.return_indices.then_some(PoolingIndices {
            indices,
            input_size,
        });
        (out, indices)
    }
}

/// Configuration for [`UpsamplingBottleneck`].
#[derive(Config, Debug)]
pub struct UpsamplingBottleneckConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    #[config(default = "4")]
    pub internal_ratio: usize,
    #[config(default = "0.0")]
    pub dropout: f64,
    #[config(default = "false")]
    pub bias: bool,
    #[config(default = "true")]
    pub relu: bool,
}

impl UpsamplingBottleneckConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SegNetResult<UpsamplingBottleneck<B>> {
        check_internal_ratio(self.internal_ratio, self.in_channels)?;
        let internal = self.in_channels / self.internal_ratio;
        let pointwise = ConvSpec::square(1).with_bias(self.bias);

        Ok(UpsamplingBottleneck {
            main_conv1: ConvBn::new(self.in_channels, self.out_channels, pointwise, device),
            ext_conv1: ConvBnAct::new(self.in_channels, internal, pointwise, self.relu, device),
            ext_tconv1: SizedConvTranspose2dConfig::new([internal, internal], [2, 2])
                .with_stride([2, 2])
                .with_bias(self.bias)
                .init(device),
            ext_tconv1_bnorm: BatchNormConfig::new(internal).init(device),
            ext_tconv1_activation: Activation::new(self.relu, device),
            ext_conv2: ConvBn::new(internal, self.out_channels, pointwise, device),
            ext_regul: Dropout2dConfig::new().with_prob(self.dropout).init(),
            out_activation: Activation::new(self.relu, device),
        })
    }
}

/// Doubles the resolution by unpooling with the indices of the matching encoder stage.
#[derive(Module, Debug)]
pub struct UpsamplingBottleneck<B: Backend> {
    main_conv1: ConvBn<B>,
    ext_conv1: ConvBnAct<B>,
    ext_tconv1: SizedConvTranspose2d<B>,
    ext_tconv1_bnorm: BatchNorm<B, 2>,
    ext_tconv1_activation: Activation<B>,
    ext_conv2: ConvBn<B>,
    ext_regul: Dropout2d,
    out_activation: Activation<B>,
}

impl<B: Backend> UpsamplingBottleneck<B> {
    pub fn forward(&self, x: Tensor<B, 4>, pooling: PoolingIndices<B>) -> Tensor<B, 4> {
        let PoolingIndices {
            indices,
            input_size,
        } = pooling;

        let main = self.main_conv1.forward(x.clone());
        let main = max_unpool2d(main, indices, input_size);

        let ext = self.ext_conv1.forward(x);
        let ext = self.ext_tconv1.forward_sized(ext, input_size);
        let ext = self
            .ext_tconv1_activation
            .forward(self.ext_tconv1_bnorm.forward(ext));
        let ext = self.ext_regul.forward(self.ext_conv2.forward(ext));

        self.out_activation.forward(main + ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn random_input(shape: [usize; 4]) -> Tensor<TestBackend, 4> {
        Tensor::random(
            shape,
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &Default::default(),
        )
    }

    #[test]
    fn initial_block_accepts_any_band_count() {
        let device = Default::default();
        for bands in [1, 3, 6, 10] {
            let block = InitialBlockConfig::new(bands, 16)
                .init::<TestBackend>(&device)
                .unwrap();
            assert_eq!(block.forward(random_input([1, bands, 17, 20])).dims(), [1, 16, 9, 10]);
        }
    }

    #[test]
    fn initial_block_rejects_too_many_bands() {
        let device = Default::default();
        let result = InitialBlockConfig::new(16, 16).init::<TestBackend>(&device);
        assert!(matches!(result, Err(SegNetError::InvalidConfiguration { .. })));
    }

    #[test]
    fn internal_ratio_is_range_checked() {
        let device = Default::default();

        for ratio in [0, 1, 65] {
            let result = RegularBottleneckConfig::new(64)
                .with_internal_ratio(ratio)
                .init::<TestBackend>(&device);
            assert!(matches!(result, Err(SegNetError::InvalidConfiguration { .. })));
        }
        assert!(DownsamplingBottleneckConfig::new(16, 64)
            .with_internal_ratio(17)
            .init::<TestBackend>(&device)
            .is_err());
        assert!(UpsamplingBottleneckConfig::new(64, 16)
            .with_internal_ratio(64)
            .init::<TestBackend>(&device)
            .is_ok());
    }

    #[test]
    fn regular_bottleneck_variants_keep_shape() {
        let device = Default::default();
        let x = random_input([2, 32, 12, 12]);

        let configs = [
            RegularBottleneckConfig::new(32).with_padding(1),
            RegularBottleneckConfig::new(32).with_dilation(4).with_padding(4),
            RegularBottleneckConfig::new(32)
                .with_kernel_size(5)
                .with_padding(2)
                .with_asymmetric(true)
                .with_relu(false),
        ];
        for config in configs {
            let block = config.init::<TestBackend>(&device).unwrap();
            assert_eq!(block.forward(x.clone()).dims(), [2, 32, 12, 12]);
        }
    }

    #[test]
    fn downsample_then_upsample_restores_odd_sizes() {
        let device = Default::default();
        let down = DownsamplingBottleneckConfig::new(16, 64)
            .with_return_indices(true)
            .init::<TestBackend>(&device)
            .unwrap();
        let up = UpsamplingBottleneckConfig::new(64, 16)
            .init::<TestBackend>(&device)
            .unwrap();

        let (y, indices) = down.forward(random_input([1, 16, 15, 10]));
        assert_eq!(y.dims(), [1, 64, 7, 5]);

        let indices = indices.unwrap();
        assert_eq!(indices.input_size, [15, 10]);
        assert_eq!(indices.indices.dims(), [1, 16, 7, 5]);

        assert_eq!(up.forward(y, indices).dims(), [1, 16, 15, 10]);
    }

    #[test]
    fn downsample_without_indices() {
        let device = Default::default();
        let down = DownsamplingBottleneckConfig::new(8, 8)
            .init::<TestBackend>(&device)
            .unwrap();

        let (y, indices) = down.forward(random_input([1, 8, 8, 8]));
        assert_eq!(y.dims(), [1, 8, 4, 4]);
        assert!(indices.is_none());
    }
}
