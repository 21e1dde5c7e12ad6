//! # Activation Layer Wrapper
//!
//! ENet lets the encoder and decoder choose between ReLU and a learned PReLU.

use burn::{
    nn::{PRelu, PReluConfig, Relu},
    prelude::*,
};

/// ReLU or PReLU.
#[derive(Module, Debug)]
pub enum Activation<B: Backend> {
    /// [`Relu`] activation layer.
    Relu(Relu),
    /// [`PRelu`] activation layer with a single shared slope.
    PRelu(PRelu<B>),
}

impl<B: Backend> Activation<B> {
    /// ReLU when `relu` is set, PReLU otherwise.
    pub fn new(relu: bool, device: &Device<B>) -> Self {
        if relu {
            Self::Relu(Relu::new())
        } else {
            Self::PRelu(PReluConfig::new().init(device))
        }
    }

    /// Forward pass.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Relu(layer) => layer.forward(input),
            Self::PRelu(layer) => layer.forward(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn prelu_keeps_negative_slope() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::from_floats([[[[-4.0, 2.0]]]], &device);

        let relu = Activation::<TestBackend>::new(true, &device).forward(x.clone());
        let prelu = Activation::<TestBackend>::new(false, &device).forward(x);

        assert_eq!(relu.into_data().to_vec::<f32>().unwrap(), vec![0.0, 2.0]);
        // default PReLU slope is 0.25
        assert_eq!(prelu.into_data().to_vec::<f32>().unwrap(), vec![-1.0, 2.0]);
    }
}
