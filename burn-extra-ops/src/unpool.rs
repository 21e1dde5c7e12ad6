//! # Max Unpooling
//!
//! Partial inverse of max pooling: pooled values are written back to the positions that
//! produced them and every other position is zero. Used by encoder-decoder networks that
//! carry pooling indices from the encoder to the symmetric decoder stage.
//!
//! The argmax is computed here rather than taken from the backend pooling op, so the index
//! layout is the same on every backend.

use burn::prelude::*;

/// Non-overlapping max pooling (stride equal to the kernel, no padding) that also returns
/// the argmax indices.
///
/// Trailing rows and columns that do not fill a whole window are dropped. Indices are
/// flattened `row * width + col` positions inside each `[height, width]` input plane, which
/// is the layout [`max_unpool2d`] expects.
///
/// # Shapes
/// - x: `[batch_size, channels, height, width]`
/// - output and indices: `[batch_size, channels, height / kh, width / kw]`
pub fn max_pool2d_indexed<B: Backend>(
    x: Tensor<B, 4>,
    kernel_size: [usize; 2],
) -> (Tensor<B, 4>, Tensor<B, 4, Int>) {
    let [batch_size, channels, height, width] = x.dims();
    let [kh, kw] = kernel_size;
    let (out_height, out_width) = (height / kh, width / kw);
    let device = x.device();

    // [N, C, OH, kh, OW, kw] -> [N, C, OH, OW, kh * kw]
    let windows = x
        .slice([0..batch_size, 0..channels, 0..out_height * kh, 0..out_width * kw])
        .reshape([batch_size, channels, out_height, kh, out_width, kw])
        .swap_dims(3, 4)
        .reshape([batch_size, channels, out_height, out_width, kh * kw]);
    let (pooled, offset) = windows.max_dim_with_indices(4);

    let shape = [batch_size, channels, out_height, out_width];
    let pooled = pooled.reshape(shape);
    let offset = offset.reshape(shape);

    let window_rows = Tensor::<B, 1, Int>::arange(0..out_height as i64, &device)
        .mul_scalar(kh as i64)
        .reshape([1, 1, out_height, 1]);
    let window_cols = Tensor::<B, 1, Int>::arange(0..out_width as i64, &device)
        .mul_scalar(kw as i64)
        .reshape([1, 1, 1, out_width]);

    let row_in_window = offset.clone().div_scalar(kw as i64);
    let col_in_window = offset - row_in_window.clone().mul_scalar(kw as i64);
    let rows = row_in_window + window_rows;
    let cols = col_in_window + window_cols;

    (pooled, rows.mul_scalar(width as i64) + cols)
}

/// Scatters `x` into a zero tensor of spatial size `output_size` at the flat `indices`.
///
/// # Shapes
/// - x: `[batch_size, channels, height, width]`
/// - indices: `[batch_size, channels, height, width]`
/// - output: `[batch_size, channels, output_size[0], output_size[1]]`
pub fn max_unpool2d<B: Backend>(
    x: Tensor<B, 4>,
    indices: Tensor<B, 4, Int>,
    output_size: [usize; 2],
) -> Tensor<B, 4> {
    let [batch_size, channels, height, width] = x.dims();
    debug_assert_eq!(indices.dims(), [batch_size, channels, height, width]);

    let [out_height, out_width] = output_size;
    let device = x.device();

    let values = x.reshape([batch_size, channels, height * width]);
    let indices = indices.reshape([batch_size, channels, height * width]);

    Tensor::<B, 3>::zeros([batch_size, channels, out_height * out_width], &device)
        .scatter(2, indices, values)
        .reshape([batch_size, channels, out_height, out_width])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn plane(rows: Vec<Vec<f32>>) -> Tensor<TestBackend, 4> {
        let [height, width] = [rows.len(), rows[0].len()];
        let values: Vec<f32> = rows.into_iter().flatten().collect();
        Tensor::from_data(
            TensorData::new(values, [1, 1, height, width]),
            &Default::default(),
        )
    }

    fn values(x: Tensor<TestBackend, 4>) -> Vec<f32> {
        x.into_data().to_vec::<f32>().unwrap()
    }

    fn indices(x: Tensor<TestBackend, 4, Int>) -> Vec<i64> {
        x.into_data().convert::<i64>().to_vec::<i64>().unwrap()
    }

    #[test]
    fn unpool_restores_max_positions() {
        let x = plane(vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![5.0, 6.0, 7.0, 8.0],
            vec![9.0, 10.0, 11.0, 12.0],
            vec![13.0, 14.0, 15.0, 16.0],
        ]);

        let (pooled, idx) = max_pool2d_indexed(x, [2, 2]);
        assert_eq!(values(pooled.clone()), vec![6.0, 8.0, 14.0, 16.0]);
        assert_eq!(indices(idx.clone()), vec![5, 7, 13, 15]);

        let restored = max_unpool2d(pooled, idx, [4, 4]);
        assert_eq!(
            values(restored),
            vec![
                0.0, 0.0, 0.0, 0.0, //
                0.0, 6.0, 0.0, 8.0, //
                0.0, 0.0, 0.0, 0.0, //
                0.0, 14.0, 0.0, 16.0,
            ]
        );
    }

    #[test]
    fn unpool_wide_plane() {
        let x = plane(vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![5.0, 6.0, 7.0, 8.0],
        ]);

        let (pooled, idx) = max_pool2d_indexed(x, [2, 2]);
        assert_eq!(indices(idx.clone()), vec![5, 7]);

        let restored = max_unpool2d(pooled, idx, [2, 4]);
        assert_eq!(
            values(restored),
            vec![
                0.0, 0.0, 0.0, 0.0, //
                0.0, 6.0, 0.0, 8.0,
            ]
        );
    }

    #[test]
    fn unpool_tall_plane() {
        let x = plane(vec![
            vec![9.0, 1.0],
            vec![2.0, 3.0],
            vec![4.0, 5.0],
            vec![6.0, 7.0],
            vec![1.0, 2.0],
            vec![8.0, 3.0],
        ]);

        let (pooled, idx) = max_pool2d_indexed(x, [2, 2]);
        assert_eq!(values(pooled.clone()), vec![9.0, 7.0, 8.0]);
        assert_eq!(indices(idx.clone()), vec![0, 7, 10]);

        let restored = max_unpool2d(pooled, idx, [6, 2]);
        assert_eq!(
            values(restored),
            vec![
                9.0, 0.0, //
                0.0, 0.0, //
                0.0, 0.0, //
                0.0, 7.0, //
                0.0, 0.0, //
                8.0, 0.0,
            ]
        );
    }

    #[test]
    fn unpool_to_odd_size() {
        // 3x5: the last row and column are outside every window.
        let x = plane(vec![
            vec![1.0, 7.0, 2.0, 3.0, 50.0],
            vec![4.0, 0.0, 6.0, 5.0, 60.0],
            vec![70.0, 80.0, 90.0, 95.0, 99.0],
        ]);

        let (pooled, idx) = max_pool2d_indexed(x, [2, 2]);
        assert_eq!(pooled.dims(), [1, 1, 1, 2]);
        assert_eq!(indices(idx.clone()), vec![1, 7]);

        let restored = max_unpool2d(pooled, idx, [3, 5]);
        assert_eq!(
            values(restored),
            vec![
                0.0, 7.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 6.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 0.0, 0.0,
            ]
        );
    }

    #[test]
    fn pooling_is_per_channel() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random(
            [2, 3, 6, 10],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );

        let (pooled, idx) = max_pool2d_indexed(x.clone(), [2, 2]);
        assert_eq!(pooled.dims(), [2, 3, 3, 5]);

        // Every pooled value is read back from its own plane at the recorded index.
        let flat = x.reshape([2, 3, 60]);
        let gathered = flat.gather(2, idx.reshape([2, 3, 15]));
        assert_eq!(
            pooled.reshape([2, 3, 15]).into_data().to_vec::<f32>().unwrap(),
            gathered.into_data().to_vec::<f32>().unwrap()
        );
    }
}
