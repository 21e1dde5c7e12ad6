//! # RefineNet Building Blocks
//!
//! - [`CrpBlock`]: chained residual pooling, a cascade of pool-and-convolve stages whose
//!   outputs are all summed onto the input.
//! - [`RcuBlock`]: a stack of residual convolution units (pre-activation ReLU + 3x3 conv).

use burn::{
    nn::{
        conv::Conv2d,
        pool::{MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
};

use super::ConvSpec;
use crate::error::{SegNetError, SegNetResult};

fn check_residual_width(block: &str, in_channels: usize, out_channels: usize) -> SegNetResult<()> {
    if in_channels != out_channels {
        return Err(SegNetError::InvalidConfiguration {
            reason: format!(
                "{block} sums its input onto its output, channels must match ({in_channels} != {out_channels})"
            ),
        });
    }
    Ok(())
}

/// Configuration for [`CrpBlock`].
#[derive(Config, Debug)]
pub struct CrpBlockConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    #[config(default = "4")]
    pub n_stages: usize,
}

impl CrpBlockConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SegNetResult<CrpBlock<B>> {
        check_residual_width("CRP block", self.in_channels, self.out_channels)?;

        let convs = (0..self.n_stages)
            .map(|i| {
                let in_channels = if i == 0 {
                    self.in_channels
                } else {
                    self.out_channels
                };
                ConvSpec::same3x3().init(in_channels, self.out_channels, device)
            })
            .collect();

        Ok(CrpBlock {
            convs,
            maxpool: MaxPool2dConfig::new([5, 5])
                .with_strides([1, 1])
                .with_padding(PaddingConfig2d::Explicit(2, 2))
                .init(),
        })
    }
}

/// Chained residual pooling.
#[derive(Module, Debug)]
pub struct CrpBlock<B: Backend> {
    convs: Vec<Conv2d<B>>,
    maxpool: MaxPool2d,
}

impl<B: Backend> CrpBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = x;
        let mut top = x.clone();
        for conv in &self.convs {
            top = conv.forward(self.maxpool.forward(top));
            x = x + top.clone();
        }
        x
    }
}

/// Configuration for [`RcuBlock`].
#[derive(Config, Debug)]
pub struct RcuBlockConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    #[config(default = "2")]
    pub n_blocks: usize,
    #[config(default = "2")]
    pub n_stages: usize,
}

impl RcuBlockConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SegNetResult<RcuBlock<B>> {
        check_residual_width("RCU block", self.in_channels, self.out_channels)?;

        let units = (0..self.n_blocks)
            .map(|i| ResidualConvUnit {
                convs: (0..self.n_stages)
                    .map(|j| {
                        let in_channels = if i == 0 && j == 0 {
                            self.in_channels
                        } else {
                            self.out_channels
                        };
                        // only the first stage of each unit carries a bias
                        ConvSpec::same3x3()
                            .with_bias(j == 0)
                            .init(in_channels, self.out_channels, device)
                    })
                    .collect(),
            })
            .collect();

        Ok(RcuBlock { units })
    }
}

/// Pre-activation residual unit of [`RcuBlock`].
#[derive(Module, Debug)]
pub struct ResidualConvUnit<B: Backend> {
    convs: Vec<Conv2d<B>>,
}

impl<B: Backend> ResidualConvUnit<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let residual = x.clone();
        let mut x = x;
        for conv in &self.convs {
            x = conv.forward(burn::tensor::activation::relu(x));
        }
        x + residual
    }
}

/// Residual convolution units applied in sequence.
#[derive(Module, Debug)]
pub struct RcuBlock<B: Backend> {
    units: Vec<ResidualConvUnit<B>>,
}

impl<B: Backend> RcuBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.units.iter().fold(x, |x, unit| unit.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn crp_without_stages_is_identity() {
        let device = Default::default();
        let crp = CrpBlockConfig::new(8, 8)
            .with_n_stages(0)
            .init::<TestBackend>(&device)
            .unwrap();

        let x = Tensor::<TestBackend, 4>::random(
            [1, 8, 5, 5],
            burn::tensor::Distribution::Default,
            &device,
        );
        let y = crp.forward(x.clone());
        y.into_data().assert_eq(&x.into_data(), true);
    }

    #[test]
    fn refine_blocks_keep_shape() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::ones([2, 16, 9, 11], &device);

        let crp = CrpBlockConfig::new(16, 16).init::<TestBackend>(&device).unwrap();
        let rcu = RcuBlockConfig::new(16, 16)
            .with_n_blocks(3)
            .init::<TestBackend>(&device)
            .unwrap();

        assert_eq!(crp.forward(x.clone()).dims(), [2, 16, 9, 11]);
        assert_eq!(rcu.forward(x).dims(), [2, 16, 9, 11]);
    }

    #[test]
    fn mismatched_widths_are_rejected() {
        let device = Default::default();
        assert!(matches!(
            CrpBlockConfig::new(16, 8).init::<TestBackend>(&device),
            Err(SegNetError::InvalidConfiguration { .. })
        ));
        assert!(RcuBlockConfig::new(4, 8).init::<TestBackend>(&device).is_err());
    }
}
