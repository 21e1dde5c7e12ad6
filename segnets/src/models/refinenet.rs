//! # RefineNet
//!
//! Multi-path refinement network on a plain ResNet encoder. Four refinement paths run from the
//! coarsest encoder stage to the finest; each path adapts its lateral features with residual
//! convolution units, fuses them with the upsampled output of the coarser path, and aggregates
//! context with chained residual pooling.

use backbones::{OutputStride, ResNetBackbone, ResNetConfig, ResNetDepth, Stem};
use burn::{
    nn::{conv::Conv2d, Dropout, DropoutConfig},
    prelude::*,
    tensor::activation::relu,
};
use burn_extra_ops::TensorExtraOps;

use super::modules::{
    check_input, spatial_size, ConvSpec, CrpBlock, CrpBlockConfig, RcuBlock, RcuBlockConfig,
};
use crate::error::{SegNetError, SegNetResult};

/// Smallest spatial input size RefineNet accepts.
pub const REFINENET_MIN_INPUT_SIZE: usize = 32;

/// Width of the coarsest refinement path.
const TOP_PATH_CHANNELS: usize = 512;
/// Width of the three finer refinement paths.
const PATH_CHANNELS: usize = 256;
/// Resolution ratio between the input and the finest encoder stage.
const FINAL_UPSAMPLE: usize = 4;

/// Configuration for the [`RefineNet`] model.
#[derive(Config, Debug)]
pub struct RefineNetConfig {
    /// Depth of the ResNet encoder.
    #[config(default = "ResNetDepth::ResNet50")]
    pub depth: ResNetDepth,
    /// Number of input bands.
    #[config(default = "3")]
    pub bands: usize,
    /// Number of output classes.
    #[config(default = "21")]
    pub num_classes: usize,
    /// Dropout applied to the two coarsest encoder stages and before the classifier.
    #[config(default = "0.5")]
    pub dropout: f64,
}

impl RefineNetConfig {
    /// RefineNet on ResNet-18.
    pub fn rf18(num_classes: usize, bands: usize) -> Self {
        Self::variant(ResNetDepth::ResNet18, num_classes, bands)
    }

    /// RefineNet on ResNet-34.
    pub fn rf34(num_classes: usize, bands: usize) -> Self {
        Self::variant(ResNetDepth::ResNet34, num_classes, bands)
    }

    /// RefineNet on ResNet-50.
    pub fn rf50(num_classes: usize, bands: usize) -> Self {
        Self::variant(ResNetDepth::ResNet50, num_classes, bands)
    }

    /// RefineNet on ResNet-101.
    pub fn rf101(num_classes: usize, bands: usize) -> Self {
        Self::variant(ResNetDepth::ResNet101, num_classes, bands)
    }

    /// RefineNet on ResNet-152.
    pub fn rf152(num_classes: usize, bands: usize) -> Self {
        Self::variant(ResNetDepth::ResNet152, num_classes, bands)
    }

    fn variant(depth: ResNetDepth, num_classes: usize, bands: usize) -> Self {
        Self::new()
            .with_depth(depth)
            .with_num_classes(num_classes)
            .with_bands(bands)
    }

    /// Checks the configuration for logically invalid values.
    pub fn validate(&self) -> SegNetResult<()> {
        if self.num_classes == 0 {
            return Err(SegNetError::InvalidConfiguration {
                reason: "num_classes must be at least 1".to_string(),
            });
        }
        if self.bands == 0 {
            return Err(SegNetError::InvalidConfiguration {
                reason: "bands must be at least 1".to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(SegNetError::InvalidConfiguration {
                reason: format!("dropout must lie in [0, 1), got {}", self.dropout),
            });
        }
        Ok(())
    }

    /// Initializes a [`RefineNet`] model.
    ///
    /// # Errors
    ///
    /// Returns [`SegNetError::InvalidConfiguration`] if the configuration is invalid.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SegNetResult<RefineNet<B>> {
        self.validate()?;
        tracing::debug!(
            depth = ?self.depth,
            bands = self.bands,
            num_classes = self.num_classes,
            dropout = self.dropout,
            "initializing RefineNet"
        );

        let encoder = ResNetConfig::new()
            .with_depth(self.depth.clone())
            .with_in_channels(self.bands)
            .with_stem(Stem::Standard)
            .with_output_stride(OutputStride::Os32)
            .init(device);
        let [c1, c2, c3, c4] = self.depth.stage_channels();

        let path4 = RefinePathConfig::new(c4, TOP_PATH_CHANNELS)
            .with_adapt_joint(false)
            .with_out_channels(Some(PATH_CHANNELS))
            .init(device)?;
        let path3 = RefinePathConfig::new(c3, PATH_CHANNELS)
            .with_out_channels(Some(PATH_CHANNELS))
            .init(device)?;
        let path2 = RefinePathConfig::new(c2, PATH_CHANNELS)
            .with_out_channels(Some(PATH_CHANNELS))
            .init(device)?;
        let path1 = RefinePathConfig::new(c1, PATH_CHANNELS).init(device)?;

        Ok(RefineNet {
            encoder,
            paths: vec![path4, path3, path2, path1],
            dropout: DropoutConfig::new(self.dropout).init(),
            classifier: ConvSpec::same3x3()
                .with_bias(true)
                .init(PATH_CHANNELS, self.num_classes, device),
            bands: self.bands,
        })
    }
}

/// Configuration for one refinement path.
#[derive(Config, Debug)]
struct RefinePathConfig {
    /// Channels of the encoder stage feeding the path.
    in_channels: usize,
    /// Working width of the path.
    channels: usize,
    /// 3x3 convolution on the adapted features before fusion with the coarser path.
    #[config(default = "true")]
    adapt_joint: bool,
    /// Width of the 3x3 output projection; `None` ends the path without projection.
    #[config(default = "None")]
    out_channels: Option<usize>,
}

impl RefinePathConfig {
    fn init<B: Backend>(&self, device: &Device<B>) -> SegNetResult<RefinePath<B>> {
        let c = self.channels;
        Ok(RefinePath {
            dimred: ConvSpec::same3x3().init(self.in_channels, c, device),
            adapt: RcuBlockConfig::new(c, c).init(device)?,
            adapt_joint: self
                .adapt_joint
                .then(|| ConvSpec::same3x3().init(c, c, device)),
            pool: CrpBlockConfig::new(c, c).init(device)?,
            fuse: RcuBlockConfig::new(c, c).with_n_blocks(3).init(device)?,
            out_joint: self
                .out_channels
                .map(|out| ConvSpec::same3x3().init(c, out, device)),
        })
    }
}

/// One refinement path: adaptation, fusion with the coarser path, pooling and output.
#[derive(Module, Debug)]
pub struct RefinePath<B: Backend> {
    dimred: Conv2d<B>,
    adapt: RcuBlock<B>,
    adapt_joint: Option<Conv2d<B>>,
    pool: CrpBlock<B>,
    fuse: RcuBlock<B>,
    out_joint: Option<Conv2d<B>>,
}

impl<B: Backend> RefinePath<B> {
    /// Refines `lateral`, fused with the output of the coarser path when there is one.
    fn forward(&self, lateral: Tensor<B, 4>, coarser: Option<Tensor<B, 4>>) -> Tensor<B, 4> {
        let mut x = self.adapt.forward(self.dimred.forward(lateral));
        if let Some(joint) = &self.adapt_joint {
            x = joint.forward(x);
        }
        if let Some(coarser) = coarser {
            x = x + coarser;
        }

        let x = self.fuse.forward(self.pool.forward(relu(x)));
        match &self.out_joint {
            Some(joint) => joint.forward(x),
            None => x,
        }
    }
}

/// RefineNet segmentation network.
#[derive(Module, Debug)]
pub struct RefineNet<B: Backend> {
    encoder: ResNetBackbone<B>,
    /// Refinement paths ordered from the coarsest stage to the finest.
    paths: Vec<RefinePath<B>>,
    dropout: Dropout,
    classifier: Conv2d<B>,
    bands: usize,
}

impl<B: Backend> RefineNet<B> {
    /// # Shapes
    /// - input: `[batch_size, bands, height, width]`, `height, width >= 32`
    /// - output: `[batch_size, num_classes, 4 * ceil(height / 4), 4 * ceil(width / 4)]`,
    ///   which is the input size whenever it is a multiple of 4
    ///
    /// # Errors
    ///
    /// Returns [`SegNetError::InvalidTensorShape`] if the input does not match the model.
    pub fn forward(&self, x: Tensor<B, 4>) -> SegNetResult<Tensor<B, 4>> {
        check_input(&x, self.bands, REFINENET_MIN_INPUT_SIZE)?;

        let [l1, l2, l3, l4] = self.encoder.forward(x);
        let l4 = self.dropout.forward(l4);
        let l3 = self.dropout.forward(l3);

        let laterals = [l4, l3, l2, l1];
        let targets = [
            Some(spatial_size(&laterals[1])),
            Some(spatial_size(&laterals[2])),
            Some(spatial_size(&laterals[3])),
            None,
        ];
        let [h1, w1] = spatial_size(&laterals[3]);

        let mut coarser = None;
        for ((path, lateral), target) in self.paths.iter().zip(laterals).zip(targets) {
            let refined = path.forward(lateral, coarser.take());
            tracing::trace!(shape = ?refined.dims(), "RefineNet path");
            coarser = Some(match target {
                Some(size) => refined.resize_align_corners(size),
                None => refined,
            });
        }

        let x = coarser.ok_or_else(|| SegNetError::InvalidConfiguration {
            reason: "RefineNet has no refinement paths".to_string(),
        })?;
        let logits = self.classifier.forward(self.dropout.forward(x));
        Ok(logits.resize_align_corners([h1 * FINAL_UPSAMPLE, w1 * FINAL_UPSAMPLE]))
    }

    /// Number of input bands the model was built for.
    pub const fn bands(&self) -> usize {
        self.bands
    }
}
