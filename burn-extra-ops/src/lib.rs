//! Additional operations for the Burn deep learning framework
//!
//! This crate provides operations that are commonly used in segmentation networks but are not
//! yet available in the core Burn framework: channel-wise dropout, ReLU6, max unpooling,
//! align-corners bilinear resizing and transposed convolutions with a requested output size.

use burn::prelude::*;

mod conv_transpose;
mod dropout2d;
mod interpolate;
mod relu6;
mod unpool;

// Convenient re-exports
pub use conv_transpose::{SizedConvTranspose2d, SizedConvTranspose2dConfig};
pub use dropout2d::{Dropout2d, Dropout2dConfig};
pub use interpolate::interpolate_align_corners;
pub use relu6::Relu6;
pub use unpool::{max_pool2d_indexed, max_unpool2d};

/// Additional operations for 4D (`[batch, channels, height, width]`) Burn tensors
pub trait TensorExtraOps<B: Backend> {
    /// Bilinear resize with `align_corners = true` semantics.
    fn resize_align_corners(self, size: [usize; 2]) -> Self;
}

impl<B: Backend> TensorExtraOps<B> for Tensor<B, 4> {
    fn resize_align_corners(self, size: [usize; 2]) -> Self {
        interpolate_align_corners(self, size)
    }
}
