//! # Pyramid Pooling Module
//!
//! Pools the encoder output into several coarse grids, projects every grid to
//! `in_channels / bins` channels, resizes them back and fuses them with the input features.

use burn::{
    nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
    prelude::*,
};
use burn_extra_ops::{interpolate_align_corners, Dropout2d, Dropout2dConfig};

use super::{spatial_size, ConvBnAct, ConvSpec};
use crate::error::{SegNetError, SegNetResult};

/// Configuration for [`PyramidPooling`].
#[derive(Config, Debug)]
pub struct PyramidPoolingConfig {
    pub in_channels: usize,
    /// Output grid size of each pooling branch.
    #[config(default = "vec![1, 2, 3, 6]")]
    pub pool_sizes: Vec<usize>,
    #[config(default = "0.1")]
    pub dropout: f64,
}

impl PyramidPoolingConfig {
    /// Channels of every pooling branch and of the fused output.
    pub fn out_channels(&self) -> usize {
        self.in_channels / self.pool_sizes.len().max(1)
    }

    pub fn init<B: Backend>(&self, device: &Device<B>) -> SegNetResult<PyramidPooling<B>> {
        if self.pool_sizes.is_empty() || self.pool_sizes.contains(&0) {
            return Err(SegNetError::InvalidConfiguration {
                reason: format!("invalid pyramid pool sizes {:?}", self.pool_sizes),
            });
        }
        let out_channels = self.out_channels();
        if out_channels == 0 {
            return Err(SegNetError::InvalidConfiguration {
                reason: format!(
                    "{} channels cannot be split over {} pyramid bins",
                    self.in_channels,
                    self.pool_sizes.len()
                ),
            });
        }

        let stages = self
            .pool_sizes
            .iter()
            .map(|&bin| PoolingStage {
                pool: AdaptiveAvgPool2dConfig::new([bin, bin]).init(),
                conv: ConvBnAct::new(self.in_channels, out_channels, ConvSpec::square(1), true, device),
            })
            .collect();

        let fused = self.in_channels + out_channels * self.pool_sizes.len();
        Ok(PyramidPooling {
            stages,
            bottleneck: ConvBnAct::new(fused, out_channels, ConvSpec::same3x3(), true, device),
            dropout: Dropout2dConfig::new().with_prob(self.dropout).init(),
        })
    }
}

/// One pooling branch: adaptive average pool, then 1x1 conv, BN and ReLU.
#[derive(Module, Debug)]
pub struct PoolingStage<B: Backend> {
    pool: AdaptiveAvgPool2d,
    conv: ConvBnAct<B>,
}

/// Pyramid pooling head of PSPNet.
#[derive(Module, Debug)]
pub struct PyramidPooling<B: Backend> {
    stages: Vec<PoolingStage<B>>,
    bottleneck: ConvBnAct<B>,
    dropout: Dropout2d,
}

impl<B: Backend> PyramidPooling<B> {
    /// # Shapes
    /// - features: `[batch_size, in_channels, height, width]`
    /// - output: `[batch_size, in_channels / bins, height, width]`
    pub fn forward(&self, features: Tensor<B, 4>) -> Tensor<B, 4> {
        let size = spatial_size(&features);

        let mut pyramids = Vec::with_capacity(self.stages.len() + 1);
        for stage in &self.stages {
            let pooled = stage.conv.forward(stage.pool.forward(features.clone()));
            pyramids.push(interpolate_align_corners(pooled, size));
        }
        pyramids.insert(0, features);

        let fused = self.bottleneck.forward(Tensor::cat(pyramids, 1));
        self.dropout.forward(fused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn pyramid_pooling_reduces_channels() {
        let device = Default::default();
        let config = PyramidPoolingConfig::new(64);
        assert_eq!(config.out_channels(), 16);

        let ppm = config.init::<TestBackend>(&device).unwrap();
        let x = Tensor::<TestBackend, 4>::ones([2, 64, 7, 9], &device);
        assert_eq!(ppm.forward(x).dims(), [2, 16, 7, 9]);
    }

    #[test]
    fn pyramid_pooling_rejects_degenerate_bins() {
        let device = Default::default();
        let empty = PyramidPoolingConfig::new(64).with_pool_sizes(vec![]);
        let too_many = PyramidPoolingConfig::new(2).with_pool_sizes(vec![1, 2, 3]);

        assert!(empty.init::<TestBackend>(&device).is_err());
        assert!(too_many.init::<TestBackend>(&device).is_err());
    }
}
