//! # Align-Corners Bilinear Interpolation
//!
//! Burn's `interpolate` follows the half-pixel convention (`align_corners = false`).
//! Segmentation heads trained with the other convention sample source coordinates as
//! `i * (in - 1) / (out - 1)`, so the corner pixels of input and output coincide.
//! The resize is expressed as two separable lerps driven by per-axis lookup tables.

use burn::prelude::*;

/// Lookup table for one spatial axis.
struct AxisLut {
    lower: Vec<i64>,
    upper: Vec<i64>,
    weights: Vec<f32>,
}

impl AxisLut {
    fn new(in_len: usize, out_len: usize) -> Self {
        let scale = if out_len > 1 {
            (in_len - 1) as f32 / (out_len - 1) as f32
        } else {
            0.0
        };

        let mut lower = Vec::with_capacity(out_len);
        let mut upper = Vec::with_capacity(out_len);
        let mut weights = Vec::with_capacity(out_len);
        for o in 0..out_len {
            let src = o as f32 * scale;
            let i0 = (src.floor() as usize).min(in_len - 1);
            let i1 = (i0 + 1).min(in_len - 1);
            lower.push(i0 as i64);
            upper.push(i1 as i64);
            weights.push(src - i0 as f32);
        }

        Self {
            lower,
            upper,
            weights,
        }
    }
}

/// Bilinear resize of `[batch, channels, height, width]` to `size` with aligned corners.
///
/// Returns the input unchanged when it already has the requested size.
pub fn interpolate_align_corners<B: Backend>(x: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    let [_, _, in_height, in_width] = x.dims();
    let [out_height, out_width] = size;

    let x = if in_height == out_height {
        x
    } else {
        lerp_axis(x, 2, AxisLut::new(in_height, out_height))
    };

    if in_width == out_width {
        x
    } else {
        lerp_axis(x, 3, AxisLut::new(in_width, out_width))
    }
}

fn lerp_axis<B: Backend>(x: Tensor<B, 4>, dim: usize, lut: AxisLut) -> Tensor<B, 4> {
    let device = x.device();
    let len = lut.weights.len();

    let lower_idx = Tensor::<B, 1, Int>::from_data(TensorData::new(lut.lower, [len]), &device);
    let upper_idx = Tensor::<B, 1, Int>::from_data(TensorData::new(lut.upper, [len]), &device);

    let mut weight_shape = [1; 4];
    weight_shape[dim] = len;
    let weights = Tensor::<B, 1>::from_data(TensorData::new(lut.weights, [len]), &device)
        .reshape(weight_shape);

    let lower = x.clone().select(dim, lower_idx);
    let upper = x.select(dim, upper_idx);

    lower.clone() + (upper - lower) * weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn assert_close(actual: Vec<f32>, expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn upsample_2x2_to_3x3() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::from_floats([[[[0.0, 1.0], [2.0, 3.0]]]], &device);

        let out = interpolate_align_corners(x, [3, 3]);

        assert_eq!(out.dims(), [1, 1, 3, 3]);
        assert_close(
            out.into_data().to_vec::<f32>().unwrap(),
            &[0.0, 0.5, 1.0, 1.0, 1.5, 2.0, 2.0, 2.5, 3.0],
        );
    }

    #[test]
    fn corners_are_preserved() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random(
            [1, 2, 5, 4],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let src = x.clone().into_data().to_vec::<f32>().unwrap();

        let out = interpolate_align_corners(x, [17, 13]);
        let dst = out.into_data().to_vec::<f32>().unwrap();

        // channel 0: top-left and bottom-right
        assert!((src[0] - dst[0]).abs() < 1e-5);
        assert!((src[5 * 4 - 1] - dst[17 * 13 - 1]).abs() < 1e-5);
    }

    #[test]
    fn broadcast_from_single_pixel() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::from_floats([[[[4.0]]], [[[-1.0]]]], &device);

        let out = interpolate_align_corners(x, [3, 2]);

        assert_eq!(out.dims(), [2, 1, 3, 2]);
        assert_close(
            out.into_data().to_vec::<f32>().unwrap(),
            &[4.0, 4.0, 4.0, 4.0, 4.0, 4.0, -1.0, -1.0, -1.0, -1.0, -1.0, -1.0],
        );
    }

    #[test]
    fn same_size_is_identity() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::ones([1, 3, 6, 6], &device);

        let out = interpolate_align_corners(x.clone(), [6, 6]);

        assert_eq!((out - x).abs().sum().into_scalar(), 0.0);
    }
}
