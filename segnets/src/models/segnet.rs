//! # Unified Segmentation Model
//!
//! [`SegNet`] wraps the three architectures behind one module type so callers can pick the
//! network at runtime from a [`SegNetConfig`](crate::config::SegNetConfig).

use burn::prelude::*;

use super::{ENet, PspNet, PspNetOutput, RefineNet};
use crate::error::SegNetResult;

/// Output of [`SegNet::forward`].
#[derive(Debug, Clone)]
pub struct SegmentationOutput<B: Backend> {
    /// Per-pixel class logits, `[batch_size, num_classes, height, width]`.
    pub logits: Tensor<B, 4>,
    /// Auxiliary logits of the same shape; only PSPNet with an auxiliary branch produces them.
    pub aux: Option<Tensor<B, 4>>,
}

impl<B: Backend> From<PspNetOutput<B>> for SegmentationOutput<B> {
    fn from(output: PspNetOutput<B>) -> Self {
        Self {
            logits: output.logits,
            aux: output.aux,
        }
    }
}

/// Any of the supported segmentation networks.
#[derive(Module, Debug)]
pub enum SegNet<B: Backend> {
    ENet(ENet<B>),
    PspNet(PspNet<B>),
    RefineNet(RefineNet<B>),
}

impl<B: Backend> SegNet<B> {
    /// Runs the wrapped network.
    ///
    /// # Errors
    ///
    /// Returns [`SegNetError::InvalidTensorShape`](crate::SegNetError::InvalidTensorShape)
    /// if the input does not match the model.
    pub fn forward(&self, x: Tensor<B, 4>) -> SegNetResult<SegmentationOutput<B>> {
        match self {
            Self::ENet(model) => Ok(SegmentationOutput {
                logits: model.forward(x)?,
                aux: None,
            }),
            Self::PspNet(model) => model.forward(x).map(Into::into),
            Self::RefineNet(model) => Ok(SegmentationOutput {
                logits: model.forward(x)?,
                aux: None,
            }),
        }
    }

    /// Number of input bands the model was built for.
    pub const fn bands(&self) -> usize {
        match self {
            Self::ENet(model) => model.bands(),
            Self::PspNet(model) => model.bands(),
            Self::RefineNet(model) => model.bands(),
        }
    }
}
