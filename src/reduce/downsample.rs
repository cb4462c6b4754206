//! Mip downsampling: mean-pool and nearest-neighbour.

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

/// Mean-pool a plane by `mip` in both dimensions.
///
/// Each output pixel is the mean of the finite values in its `mip x mip`
/// input block; an all-NaN block yields NaN. Rows and columns beyond the
/// last full block are dropped, so the output shape is
/// `(ny / mip, nx / mip)` with integer division.
pub fn mean_pool(plane: ArrayView2<'_, f32>, mip: usize) -> Array2<f32> {
    let (ny, nx) = plane.dim();
    let out_ny = ny / mip;
    let out_nx = nx / mip;
    let mut out = vec![0.0f32; out_ny * out_nx];

    out.par_chunks_mut(out_nx.max(1))
        .enumerate()
        .for_each(|(j, row)| {
            for (i, cell) in row.iter_mut().enumerate() {
                let mut sum = 0.0f32;
                let mut count = 0u32;
                for dy in 0..mip {
                    for dx in 0..mip {
                        let v = plane[[j * mip + dy, i * mip + dx]];
                        if !v.is_nan() {
                            sum += v;
                            count += 1;
                        }
                    }
                }
                *cell = if count > 0 { sum / count as f32 } else { f32::NAN };
            }
        });

    Array2::from_shape_vec((out_ny, out_nx), out).expect("pooled buffer matches output shape")
}

/// Subsample a plane at stride `mip`, keeping the top-left pixel of each
/// block. Shape law matches [`mean_pool`].
pub fn nearest(plane: ArrayView2<'_, f32>, mip: usize) -> Array2<f32> {
    let (ny, nx) = plane.dim();
    let out_ny = ny / mip;
    let out_nx = nx / mip;
    let mut out = vec![0.0f32; out_ny * out_nx];

    out.par_chunks_mut(out_nx.max(1))
        .enumerate()
        .for_each(|(j, row)| {
            for (i, cell) in row.iter_mut().enumerate() {
                *cell = plane[[j * mip, i * mip]];
            }
        });

    Array2::from_shape_vec((out_ny, out_nx), out).expect("sampled buffer matches output shape")
}
