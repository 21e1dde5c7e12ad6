//! # PSPNet
//!
//! Pyramid scene parsing network on a dilated encoder. The master branch runs the pyramid
//! pooling module on the last encoder stage; an optional auxiliary branch classifies the
//! previous stage. Both predictions are resized to the input resolution with align-corners
//! bilinear interpolation.

use backbones::{
    create_backbone, Backbone, BackboneType, BackboneWrapper, DownsampleFactor,
    MobileNetV2Config, OutputStride, ResNetConfig, ResNetDepth, Stem,
};
use burn::{nn::conv::Conv2d, prelude::*};
use burn_extra_ops::{interpolate_align_corners, Dropout2d, Dropout2dConfig};

use super::modules::{
    check_input, spatial_size, ConvBnAct, ConvSpec, PyramidPooling, PyramidPoolingConfig,
};
use crate::{
    config::PspBackbone,
    error::{SegNetError, SegNetResult},
};

/// Smallest spatial input size PSPNet accepts.
pub const PSPNET_MIN_INPUT_SIZE: usize = 32;

const AUX_DROPOUT: f64 = 0.1;

/// Configuration for the [`PspNet`] model.
#[derive(Config, Debug)]
pub struct PspNetConfig {
    /// Number of output classes.
    pub num_classes: usize,
    /// Output stride of the encoder, 8 or 16.
    #[config(default = "8")]
    pub downsample_factor: usize,
    /// Number of input bands.
    #[config(default = "6")]
    pub bands: usize,
    /// Encoder network.
    #[config(default = "PspBackbone::ResNet50")]
    pub backbone: PspBackbone,
    /// Whether to build the auxiliary classifier on the penultimate encoder stage.
    #[config(default = "false")]
    pub aux_branch: bool,
}

impl PspNetConfig {
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
        if !matches!(self.downsample_factor, 8 | 16) {
            return Err(SegNetError::InvalidConfiguration {
                reason: format!(
                    "downsample_factor must be 8 or 16, got {}",
                    self.downsample_factor
                ),
            });
        }
        Ok(())
    }

    fn backbone_type(&self) -> SegNetResult<BackboneType> {
        let factor = self.downsample_factor;
        let unsupported = || SegNetError::InvalidConfiguration {
            reason: format!("unsupported downsample_factor {factor}"),
        };

        Ok(match self.backbone {
            PspBackbone::ResNet50 => BackboneType::ResNet(
                ResNetConfig::new()
                    .with_depth(ResNetDepth::ResNet50)
                    .with_in_channels(self.bands)
                    .with_stem(Stem::Deep)
                    .with_output_stride(OutputStride::from_factor(factor).ok_or_else(unsupported)?),
            ),
            PspBackbone::MobileNet => BackboneType::MobileNetV2(
                MobileNetV2Config::new()
                    .with_in_channels(self.bands)
                    .with_downsample_factor(
                        DownsampleFactor::from_factor(factor).ok_or_else(unsupported)?,
                    ),
            ),
        })
    }

    /// Initializes a [`PspNet`] model.
    ///
    /// # Errors
    ///
    /// Returns [`SegNetError::InvalidConfiguration`] if the configuration is invalid.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SegNetResult<PspNet<B>> {
        self.validate()?;
        tracing::debug!(
            backbone = self.backbone.name(),
            bands = self.bands,
            num_classes = self.num_classes,
            downsample_factor = self.downsample_factor,
            aux_branch = self.aux_branch,
            "initializing PSPNet"
        );

        let backbone = create_backbone(&self.backbone_type()?, device);
        let (aux_channels, out_channels) = self.backbone.channels();

        let ppm_config = PyramidPoolingConfig::new(out_channels);
        let master_branch = MasterBranch {
            classifier: ConvSpec::square(1)
                .with_bias(true)
                .init(ppm_config.out_channels(), self.num_classes, device),
            pyramid: ppm_config.init(device)?,
        };

        let auxiliary_branch = self.aux_branch.then(|| {
            let hidden = out_channels / 8;
            AuxiliaryBranch {
                conv: ConvBnAct::new(aux_channels, hidden, ConvSpec::same3x3(), true, device),
                dropout: Dropout2dConfig::new().with_prob(AUX_DROPOUT).init(),
                classifier: ConvSpec::square(1)
                    .with_bias(true)
                    .init(hidden, self.num_classes, device),
            }
        });

        Ok(PspNet {
            backbone,
            master_branch,
            auxiliary_branch,
            bands: self.bands,
        })
    }
}

/// Pyramid pooling head and classifier.
#[derive(Module, Debug)]
pub struct MasterBranch<B: Backend> {
    pyramid: PyramidPooling<B>,
    classifier: Conv2d<B>,
}

/// Classifier on the penultimate encoder stage.
#[derive(Module, Debug)]
pub struct AuxiliaryBranch<B: Backend> {
    conv: ConvBnAct<B>,
    dropout: Dropout2d,
    classifier: Conv2d<B>,
}

/// Output of [`PspNet::forward`].
#[derive(Debug, Clone)]
pub struct PspNetOutput<B: Backend> {
    /// Main prediction, `[batch_size, num_classes, height, width]`.
    pub logits: Tensor<B, 4>,
    /// Auxiliary prediction, present when the model was built with an auxiliary branch.
    pub aux: Option<Tensor<B, 4>>,
}

/// PSPNet segmentation network.
#[derive(Module, Debug)]
pub struct PspNet<B: Backend> {
    backbone: BackboneWrapper<B>,
    master_branch: MasterBranch<B>,
    auxiliary_branch: Option<AuxiliaryBranch<B>>,
    bands: usize,
}

impl<B: Backend> PspNet<B> {
    /// # Shapes
    /// - input: `[batch_size, bands, height, width]`, `height, width >= 32`
    /// - logits and aux: `[batch_size, num_classes, height, width]`
    ///
    /// # Errors
    ///
    /// Returns [`SegNetError::InvalidTensorShape`] if the input does not match the model.
    pub fn forward(&self, x: Tensor<B, 4>) -> SegNetResult<PspNetOutput<B>> {
        check_input(&x, self.bands, PSPNET_MIN_INPUT_SIZE)?;
        let input_size = spatial_size(&x);

        let [_, _, aux_features, features] = self.backbone.forward(x);
        tracing::trace!(
            aux = ?aux_features.dims(),
            main = ?features.dims(),
            "PSPNet encoder features"
        );

        let logits = self.master_branch.pyramid.forward(features);
        let logits = self.master_branch.classifier.forward(logits);
        let logits = interpolate_align_corners(logits, input_size);

        let aux = self.auxiliary_branch.as_ref().map(|branch| {
            let aux = branch.dropout.forward(branch.conv.forward(aux_features));
            interpolate_align_corners(branch.classifier.forward(aux), input_size)
        });

        Ok(PspNetOutput { logits, aux })
    }

    /// Number of input bands the model was built for.
    pub const fn bands(&self) -> usize {
        self.bands
    }

    /// Whether the auxiliary classifier is present.
    pub const fn has_aux_branch(&self) -> bool {
        self.auxiliary_branch.is_some()
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
    fn pspnet_mobilenet_with_aux() {
        let device = Default::default();
        let model = PspNetConfig::new(3)
            .with_backbone(PspBackbone::MobileNet)
            .with_aux_branch(true)
            .init::<TestBackend>(&device)
            .unwrap();
        assert!(model.has_aux_branch());

        let output = model.forward(random_input([2, 6, 64, 48])).unwrap();
        assert_eq!(output.logits.dims(), [2, 3, 64, 48]);
        assert_eq!(output.aux.map(|aux| aux.dims()), Some([2, 3, 64, 48]));
    }

    #[test]
    fn pspnet_mobilenet_downsample_16() {
        let device = Default::default();
        let model = PspNetConfig::new(2)
            .with_bands(4)
            .with_downsample_factor(16)
            .with_backbone(PspBackbone::MobileNet)
            .init::<TestBackend>(&device)
            .unwrap();

        let output = model.forward(random_input([1, 4, 40, 40])).unwrap();
        assert_eq!(output.logits.dims(), [1, 2, 40, 40]);
        assert!(output.aux.is_none());
    }

    #[test]
    fn pspnet_resnet50() {
        let device = Default::default();
        let model = PspNetConfig::new(3)
            .with_aux_branch(true)
            .init::<TestBackend>(&device)
            .unwrap();

        let output = model.forward(random_input([1, 6, 32, 32])).unwrap();
        assert_eq!(output.logits.dims(), [1, 3, 32, 32]);
        assert_eq!(output.aux.map(|aux| aux.dims()), Some([1, 3, 32, 32]));
    }

    #[test]
    fn pspnet_config_validation() {
        assert!(PspNetConfig::new(3).validate().is_ok());
        assert!(PspNetConfig::new(0).validate().is_err());
        assert!(PspNetConfig::new(3).with_bands(0).validate().is_err());
        assert!(matches!(
            PspNetConfig::new(3).with_downsample_factor(32).validate(),
            Err(SegNetError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn pspnet_rejects_small_inputs() {
        let device = Default::default();
        let model = PspNetConfig::new(3)
            .with_backbone(PspBackbone::MobileNet)
            .init::<TestBackend>(&device)
            .unwrap();

        assert!(matches!(
            model.forward(random_input([1, 6, 16, 64])),
            Err(SegNetError::InvalidTensorShape { .. })
        ));
    }
}
