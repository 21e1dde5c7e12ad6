//! # Channel Dropout
//!
//! Implements spatial (channel-wise) dropout. Instead of zeroing single activations, entire
//! feature maps are dropped, which suits convolutional features whose neighbouring pixels are
//! strongly correlated.

use burn::{prelude::*, tensor::Distribution};

/// Configuration for the `Dropout2d` module.
#[derive(Config, Debug)]
pub struct Dropout2dConfig {
    /// The probability of dropping a channel.
    #[config(default = "0.5")]
    pub prob: f64,
}

impl Dropout2dConfig {
    /// Initializes a new `Dropout2d` module.
    pub const fn init(&self) -> Dropout2d {
        Dropout2d { prob: self.prob }
    }
}

/// Dropout2d module.
///
/// Follows Burn's `Dropout` convention: the mask is only applied when the backend tracks
/// gradients, so inference backends always see the identity.
#[derive(Module, Clone, Debug)]
pub struct Dropout2d {
    prob: f64,
}

impl Dropout2d {
    /// The probability of dropping a channel.
    pub const fn prob(&self) -> f64 {
        self.prob
    }

    /// Applies channel dropout to the input tensor.
    ///
    /// A Bernoulli mask of shape `[batch_size, channels, 1, 1]` is drawn and broadcast over the
    /// spatial dimensions; surviving channels are scaled by `1 / (1 - prob)`.
    ///
    /// # Shapes
    /// - input: `[batch_size, channels, height, width]`
    /// - output: `[batch_size, channels, height, width]`
    pub fn forward<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if !B::ad_enabled() || self.prob == 0.0 {
            return x;
        }
        if self.prob >= 1.0 {
            return x.zeros_like();
        }

        let keep_prob = 1.0 - self.prob;
        let [batch_size, channels, _, _] = x.dims();
        let mask = Tensor::<B, 4>::random(
            [batch_size, channels, 1, 1],
            Distribution::Bernoulli(keep_prob),
            &x.device(),
        );

        x * mask / keep_prob
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArray, Autodiff};

    type InferenceBackend = NdArray<f32>;
    type TrainingBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_dropout2d_inference_is_identity() {
        let device = Default::default();
        let dropout = Dropout2dConfig::new().with_prob(0.9).init();
        let x = Tensor::<InferenceBackend, 4>::ones([2, 3, 4, 4], &device);

        let output = dropout.forward(x.clone());

        let diff = (output - x).abs().sum();
        assert_eq!(diff.into_scalar(), 0.0);
    }

    #[test]
    fn test_dropout2d_drops_whole_channels() {
        let device = Default::default();
        let dropout = Dropout2dConfig::new().with_prob(0.5).init();
        let x = Tensor::<TrainingBackend, 4>::ones([4, 8, 3, 3], &device);

        let output = dropout.forward(x);
        let values = output.into_data().to_vec::<f32>().unwrap();

        // Each 3x3 plane is either all zeros or all 2.0 (1 / keep_prob).
        for plane in values.chunks(9) {
            let first = plane[0];
            assert!(first == 0.0 || (first - 2.0).abs() < 1e-6);
            assert!(plane.iter().all(|&v| v == first));
        }
    }

    #[test]
    fn test_dropout2d_full_drop() {
        let device = Default::default();
        let dropout = Dropout2dConfig::new().with_prob(1.0).init();
        let x = Tensor::<TrainingBackend, 4>::ones([1, 2, 2, 2], &device);

        let output = dropout.forward(x);

        assert_eq!(output.sum().into_scalar(), 0.0);
    }
}
