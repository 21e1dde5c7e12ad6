//! # ENet
//!
//! Lightweight encoder-decoder for real-time segmentation. The encoder downsamples twice with
//! max-pooling bottlenecks and then stacks regular, dilated and asymmetric bottlenecks; the
//! decoder reuses the encoder pooling indices to unpool back to full resolution.
//!
//! Every stage records the size of its input, so any `height, width >= 8` is reproduced
//! exactly by the decoder, odd sizes included.

use burn::prelude::*;
use burn_extra_ops::{SizedConvTranspose2d, SizedConvTranspose2dConfig};

use super::modules::{
    check_input, spatial_size, DownsamplingBottleneck,
    DownsamplingBottleneckConfig, InitialBlock, InitialBlockConfig, RegularBottleneck,
    RegularBottleneckConfig, UpsamplingBottleneck, UpsamplingBottleneckConfig,
};
use crate::error::{SegNetError, SegNetResult};

/// Smallest spatial input size ENet accepts.
pub const ENET_MIN_INPUT_SIZE: usize = 8;

const INITIAL_CHANNELS: usize = 16;
const STAGE1_CHANNELS: usize = 64;
const STAGE2_CHANNELS: usize = 128;

const STAGE1_DROPOUT: f64 = 0.01;
const DROPOUT: f64 = 0.1;

/// `(kernel_size, padding, dilation, asymmetric)` of the eight bottlenecks shared by
/// stages 2 and 3.
const DILATED_STAGE: [(usize, usize, usize, bool); 8] = [
    (3, 1, 1, false),
    (3, 2, 2, false),
    (5, 2, 1, true),
    (3, 4, 4, false),
    (3, 1, 1, false),
    (3, 8, 8, false),
    (5, 2, 1, true),
    (3, 16, 16, false),
];

/// Configuration for the [`ENet`] model.
#[derive(Config, Debug)]
pub struct ENetConfig {
    /// Number of input bands.
    #[config(default = "3")]
    pub bands: usize,
    /// Number of output classes.
    #[config(default = "19")]
    pub num_classes: usize,
    /// Use ReLU in the encoder, PReLU otherwise.
    #[config(default = "true")]
    pub encoder_relu: bool,
    /// Use ReLU in the decoder, PReLU otherwise.
    #[config(default = "true")]
    pub decoder_relu: bool,
}

impl ENetConfig {
    /// Checks the configuration for logically invalid values.
    pub fn validate(&self) -> SegNetResult<()> {
        if self.num_classes == 0 {
            return Err(SegNetError::InvalidConfiguration {
                reason: "num_classes must be at least 1".to_string(),
            });
        }
        if self.bands == 0 || self.bands >= INITIAL_CHANNELS {
            return Err(SegNetError::InvalidConfiguration {
                reason: format!(
                    "ENet supports 1 to {} input bands, got {}",
                    INITIAL_CHANNELS - 1,
                    self.bands
                ),
            });
        }
        Ok(())
    }

    /// Initializes an [`ENet`] model.
    ///
    /// # Errors
    ///
    /// Returns [`SegNetError::InvalidConfiguration`] if the configuration is invalid.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SegNetResult<ENet<B>> {
        self.validate()?;
        tracing::debug!(
            bands = self.bands,
            num_classes = self.num_classes,
            encoder_relu = self.encoder_relu,
            decoder_relu = self.decoder_relu,
            "initializing ENet"
        );

        let enc = self.encoder_relu;
        let dec = self.decoder_relu;
        let regular = |channels: usize, dropout: f64, relu: bool| {
            RegularBottleneckConfig::new(channels)
                .with_padding(1)
                .with_dropout(dropout)
                .with_relu(relu)
                .init(device)
        };

        let initial_block = InitialBlockConfig::new(self.bands, INITIAL_CHANNELS)
            .with_relu(enc)
            .init(device)?;

        let downsample1_0 = DownsamplingBottleneckConfig::new(INITIAL_CHANNELS, STAGE1_CHANNELS)
            .with_return_indices(true)
            .with_dropout(STAGE1_DROPOUT)
            .with_relu(enc)
            .init(device)?;
        let stage1 = (0..4)
            .map(|_| regular(STAGE1_CHANNELS, STAGE1_DROPOUT, enc))
            .collect::<SegNetResult<Vec<_>>>()?;

        let downsample2_0 = DownsamplingBottleneckConfig::new(STAGE1_CHANNELS, STAGE2_CHANNELS)
            .with_return_indices(true)
            .with_dropout(DROPOUT)
            .with_relu(enc)
            .init(device)?;
        let stage2 = dilated_stage(enc, device)?;
        let stage3 = dilated_stage(enc, device)?;

        let upsample4_0 = UpsamplingBottleneckConfig::new(STAGE2_CHANNELS, STAGE1_CHANNELS)
            .with_dropout(DROPOUT)
            .with_relu(dec)
            .init(device)?;
        let stage4 = (0..2)
            .map(|_| regular(STAGE1_CHANNELS, DROPOUT, dec))
            .collect::<SegNetResult<Vec<_>>>()?;

        let upsample5_0 = UpsamplingBottleneckConfig::new(STAGE1_CHANNELS, INITIAL_CHANNELS)
            .with_dropout(DROPOUT)
            .with_relu(dec)
            .init(device)?;
        let stage5 = vec![regular(INITIAL_CHANNELS, DROPOUT, dec)?];

        let transposed_conv =
            SizedConvTranspose2dConfig::new([INITIAL_CHANNELS, self.num_classes], [3, 3])
                .with_stride([2, 2])
                .with_padding([1, 1])
                .with_bias(false)
                .init(device);

        Ok(ENet {
            initial_block,
            downsample1_0,
            stage1,
            downsample2_0,
            stage2,
            stage3,
            upsample4_0,
            stage4,
            upsample5_0,
            stage5,
            transposed_conv,
            bands: self.bands,
        })
    }
}

fn dilated_stage<B: Backend>(
    relu: bool,
    device: &Device<B>,
) -> SegNetResult<Vec<RegularBottleneck<B>>> {
    DILATED_STAGE
        .iter()
        .map(|&(kernel_size, padding, dilation, asymmetric)| {
            RegularBottleneckConfig::new(STAGE2_CHANNELS)
                .with_kernel_size(kernel_size)
                .with_padding(padding)
                .with_dilation(dilation)
                .with_asymmetric(asymmetric)
                .with_dropout(DROPOUT)
                .with_relu(relu)
                .init(device)
        })
        .collect()
}

/// ENet segmentation network.
#[derive(Module, Debug)]
pub struct ENet<B: Backend> {
    initial_block: InitialBlock<B>,
    downsample1_0: DownsamplingBottleneck<B>,
    stage1: Vec<RegularBottleneck<B>>,
    downsample2_0: DownsamplingBottleneck<B>,
    stage2: Vec<RegularBottleneck<B>>,
    stage3: Vec<RegularBottleneck<B>>,
    upsample4_0: UpsamplingBottleneck<B>,
    stage4: Vec<RegularBottleneck<B>>,
    upsample5_0: UpsamplingBottleneck<B>,
    stage5: Vec<RegularBottleneck<B>>,
    transposed_conv: SizedConvTranspose2d<B>,
    bands: usize,
}

fn run_stage<B: Backend>(blocks: &[RegularBottleneck<B>], x: Tensor<B, 4>) -> Tensor<B, 4> {
    blocks.iter().fold(x, |x, block| block.forward(x))
}

impl<B: Backend> ENet<B> {
    /// Computes per-pixel class logits.
    ///
    /// # Shapes
    /// - input: `[batch_size, bands, height, width]`, `height, width >= 8`
    /// - output: `[batch_size, num_classes, height, width]`
    ///
    /// # Errors
    ///
    /// Returns [`SegNetError::InvalidTensorShape`] if the input does not match the model.
    pub fn forward(&self, x: Tensor<B, 4>) -> SegNetResult<Tensor<B, 4>> {
        check_input(&x, self.bands, ENET_MIN_INPUT_SIZE)?;
        let input_size = spatial_size(&x);

        let x = self.initial_block.forward(x);

        // Encoder
        let (x, Some(indices1)) = self.downsample1_0.forward(x) else {
            return Err(missing_indices(1));
        };
        let x = run_stage(&self.stage1, x);
        tracing::trace!(shape = ?x.dims(), "ENet stage 1");

        let (x, Some(indices2)) = self.downsample2_0.forward(x) else {
            return Err(missing_indices(2));
        };
        let x = run_stage(&self.stage2, x);
        let x = run_stage(&self.stage3, x);
        tracing::trace!(shape = ?x.dims(), "ENet stage 3");

        // Decoder
        let x = self.upsample4_0.forward(x, indices2);
        let x = run_stage(&self.stage4, x);
        let x = self.upsample5_0.forward(x, indices1);
        let x = run_stage(&self.stage5, x);
        tracing::trace!(shape = ?x.dims(), "ENet stage 5");

        Ok(self.transposed_conv.forward_sized(x, input_size))
    }

    /// Number of input bands the model was built for.
    pub const fn bands(&self) -> usize {
        self.bands
    }
}

fn missing_indices(stage: usize) -> SegNetError {
    SegNetError::InvalidConfiguration {
        reason: format!("ENet stage {stage} downsampling did not record pooling indices"),
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
    fn enet_reproduces_input_resolution() {
        let device = Default::default();
        let model = ENetConfig::new()
            .with_bands(6)
            .with_num_classes(3)
            .init::<TestBackend>(&device)
            .unwrap();

        for [h, w] in [[32, 32], [8, 8], [27, 41], [64, 32], [41, 27]] {
            let logits = model.forward(random_input([1, 6, h, w])).unwrap();
            assert_eq!(logits.dims(), [1, 3, h, w]);
        }
    }

    #[test]
    fn enet_tall_input_is_finite() {
        let device = Default::default();
        let model = ENetConfig::new().init::<TestBackend>(&device).unwrap();

        let logits = model.forward(random_input([1, 3, 64, 32])).unwrap();
        assert_eq!(logits.dims(), [1, 19, 64, 32]);
        assert!(!logits.is_nan().any().into_scalar());
    }

    #[test]
    fn transposed_conv_keeps_default_init() {
        let device = Default::default();
        let model = ENetConfig::new().init::<TestBackend>(&device).unwrap();

        // Kaiming-uniform with gain 1/sqrt(3): |w| <= sqrt(1 / fan_in), fan_in = 19 * 3 * 3
        let bound = (1.0f32 / 171.0).sqrt();
        let max = model
            .transposed_conv
            .weight
            .val()
            .abs()
            .max()
            .into_scalar();
        assert!(max <= bound + 1e-6, "max |w| = {max}");
    }

    #[test]
    fn enet_with_prelu() {
        let device = Default::default();
        let model = ENetConfig::new()
            .with_num_classes(5)
            .with_encoder_relu(false)
            .with_decoder_relu(false)
            .init::<TestBackend>(&device)
            .unwrap();

        let logits = model.forward(random_input([2, 3, 16, 24])).unwrap();
        assert_eq!(logits.dims(), [2, 5, 16, 24]);
    }

    #[test]
    fn enet_rejects_bad_inputs() {
        let device = Default::default();
        let model = ENetConfig::new().init::<TestBackend>(&device).unwrap();

        assert!(matches!(
            model.forward(random_input([1, 4, 16, 16])),
            Err(SegNetError::InvalidTensorShape { .. })
        ));
        assert!(matches!(
            model.forward(random_input([1, 3, 7, 16])),
            Err(SegNetError::InvalidTensorShape { .. })
        ));
    }

    #[test]
    fn enet_config_validation() {
        assert!(ENetConfig::new().validate().is_ok());
        assert!(ENetConfig::new().with_num_classes(0).validate().is_err());
        assert!(ENetConfig::new().with_bands(0).validate().is_err());
        assert!(ENetConfig::new().with_bands(16).validate().is_err());
    }
}
