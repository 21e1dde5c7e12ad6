//! MobileNetV2 encoder for the segmentation models.
//!
//! The classifier and the final 1x1 → 1280 convolution are omitted; the encoder exposes four
//! feature levels ending at feature indices 4, 7, 14 and 18 of the reference layout
//! (24, 32, 96 and 320 channels). The last two levels can be dilated so the encoder stops at
//! a downsample factor of 8 or 16.

use burn::prelude::*;

mod blocks;
pub use blocks::*;

/// Inverted residual settings: expand ratio, output channels, repeats, first stride.
const INVERTED_RESIDUAL_SETTINGS: [(usize, usize, usize, usize); 7] = [
    (1, 16, 1, 1),
    (6, 24, 2, 2),
    (6, 32, 3, 2),
    (6, 64, 4, 2),
    (6, 96, 3, 1),
    (6, 160, 3, 2),
    (6, 320, 1, 1),
];

const STEM_CHANNELS: usize = 32;

/// Exclusive feature index at which each of the four levels ends (the stem is feature 0).
const LEVEL_ENDS: [usize; 4] = [4, 7, 14, 18];

/// Output channels of the four levels.
pub const MOBILENET_V2_CHANNELS: [usize; 4] = [24, 32, 96, 320];

/// Ratio between input resolution and the resolution of the last level.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum DownsampleFactor {
    /// Features 7..14 dilated by 2, features 14..18 by 4.
    X8,
    /// Features 14..18 dilated by 2.
    X16,
    /// Plain MobileNetV2.
    X32,
}

impl DownsampleFactor {
    /// Parse a numeric factor; only 8, 16 and 32 are supported.
    pub const fn from_factor(factor: usize) -> Option<Self> {
        match factor {
            8 => Some(Self::X8),
            16 => Some(Self::X16),
            32 => Some(Self::X32),
            _ => None,
        }
    }

    /// The numeric factor.
    pub const fn factor(&self) -> usize {
        match self {
            Self::X8 => 8,
            Self::X16 => 16,
            Self::X32 => 32,
        }
    }

    /// Dilation applied to the block at `feature_index`.
    const fn dilate(&self, feature_index: usize) -> usize {
        match self {
            Self::X8 if feature_index >= LEVEL_ENDS[2] => 4,
            Self::X8 if feature_index >= LEVEL_ENDS[1] => 2,
            Self::X16 if feature_index >= LEVEL_ENDS[2] => 2,
            _ => 1,
        }
    }
}

/// MobileNetV2 configuration
#[derive(Config, Debug)]
pub struct MobileNetV2Config {
    /// Number of input bands
    #[config(default = "3")]
    pub in_channels: usize,
    /// Downsample factor of the last level
    #[config(default = "DownsampleFactor::X8")]
    pub downsample_factor: DownsampleFactor,
}

impl MobileNetV2Config {
    /// Initialize MobileNetV2 encoder
    pub fn init<B: Backend>(&self, device: &B::Device) -> MobileNetV2Backbone<B> {
        let stem = ConvBnRelu6::stem(self.in_channels, STEM_CHANNELS, 2, device);

        let mut levels: [Vec<InvertedResidual<B>>; 4] = Default::default();
        let mut in_channels = STEM_CHANNELS;
        let mut feature_index = 1;

        for (t, c, n, s) in INVERTED_RESIDUAL_SETTINGS {
            for i in 0..n {
                let stride = if i == 0 { s } else { 1 };
                let block = InvertedResidual::new(
                    in_channels,
                    c,
                    stride,
                    t,
                    self.downsample_factor.dilate(feature_index),
                    device,
                );

                let level = LEVEL_ENDS
                    .iter()
                    .position(|&end| feature_index < end)
                    .unwrap_or(LEVEL_ENDS.len() - 1);
                levels[level].push(block);

                in_channels = c;
                feature_index += 1;
            }
        }

        let [level1, level2, level3, level4] = levels;

        MobileNetV2Backbone {
            stem,
            level1,
            level2,
            level3,
            level4,
        }
    }
}

/// MobileNetV2 feature extractor.
#[derive(Module, Debug)]
pub struct MobileNetV2Backbone<B: Backend> {
    stem: ConvBnRelu6<B>,
    level1: Vec<InvertedResidual<B>>,
    level2: Vec<InvertedResidual<B>>,
    level3: Vec<InvertedResidual<B>>,
    level4: Vec<InvertedResidual<B>>,
}

impl<B: Backend> MobileNetV2Backbone<B> {
    /// Forward pass that returns the 4 feature levels.
    pub fn forward(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 4] {
        let x = self.stem.forward(input);

        let f1 = Self::run(&self.level1, x);
        let f2 = Self::run(&self.level2, f1.clone());
        let f3 = Self::run(&self.level3, f2.clone());
        let f4 = Self::run(&self.level4, f3.clone());

        [f1, f2, f3, f4]
    }

    /// Output channels of the four feature levels.
    pub const fn output_channels(&self) -> [usize; 4] {
        MOBILENET_V2_CHANNELS
    }

    /// Number of inverted residual blocks (features 1..18).
    pub fn num_blocks(&self) -> usize {
        self.level1.len() + self.level2.len() + self.level3.len() + self.level4.len()
    }

    fn run(blocks: &[InvertedResidual<B>], input: Tensor<B, 4>) -> Tensor<B, 4> {
        blocks.iter().fold(input, |x, block| block.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn random_input(shape: [usize; 4]) -> Tensor<TestBackend, 4> {
        Tensor::<TestBackend, 4>::random(
            shape,
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &Default::default(),
        )
    }

    #[test]
    fn test_mobilenet_layout() {
        let device = Default::default();
        let model = MobileNetV2Config::new().init::<TestBackend>(&device);

        assert_eq!(model.num_blocks(), 17);
        assert_eq!(model.level1.len(), 3);
        assert_eq!(model.level2.len(), 3);
        assert_eq!(model.level3.len(), 7);
        assert_eq!(model.level4.len(), 4);
    }

    #[test]
    fn test_residual_follows_nominal_stride() {
        let device = Default::default();
        let model = MobileNetV2Config::new().init::<TestBackend>(&device);

        // feature 7 (first 64-channel block) was strided and changes width
        assert!(!model.level3[0].has_residual());
        // feature 8 repeats 64 channels at stride 1
        assert!(model.level3[1].has_residual());
        // feature 14 (first 160-channel block) lost its stride to dilation but stays plain
        assert!(!model.level4[0].has_residual());
    }

    #[test]
    fn test_mobilenet_forward_x8() {
        let device = Default::default();
        let model = MobileNetV2Config::new()
            .with_in_channels(6)
            .init::<TestBackend>(&device);

        let output = model.forward(random_input([2, 6, 64, 64]));

        assert_eq!(output[0].dims(), [2, 24, 16, 16]);
        assert_eq!(output[1].dims(), [2, 32, 8, 8]);
        assert_eq!(output[2].dims(), [2, 96, 8, 8]);
        assert_eq!(output[3].dims(), [2, 320, 8, 8]);
    }

    #[test]
    fn test_mobilenet_forward_x16_and_x32() {
        let device = Default::default();

        let x16 = MobileNetV2Config::new()
            .with_downsample_factor(DownsampleFactor::X16)
            .init::<TestBackend>(&device);
        let output = x16.forward(random_input([1, 3, 64, 64]));
        assert_eq!(output[2].dims(), [1, 96, 4, 4]);
        assert_eq!(output[3].dims(), [1, 320, 4, 4]);

        let x32 = MobileNetV2Config::new()
            .with_downsample_factor(DownsampleFactor::X32)
            .init::<TestBackend>(&device);
        let output = x32.forward(random_input([1, 3, 64, 64]));
        assert_eq!(output[3].dims(), [1, 320, 2, 2]);
    }
}
