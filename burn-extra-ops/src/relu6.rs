//! ReLU6 activation

use burn::prelude::*;

/// Applies `min(max(x, 0), 6)` element-wise.
#[derive(Module, Clone, Debug, Default)]
pub struct Relu6;

impl Relu6 {
    /// Create new Relu6 module
    pub const fn new() -> Self {
        Self
    }

    /// Forward pass
    pub fn forward<B: Backend, const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        input.clamp(0.0, 6.0)
    }
}
