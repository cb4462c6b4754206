//! NaN-aware parallel histogram binning.

use ndarray::ArrayView2;
use rayon::prelude::*;

const MIN_CHUNK: usize = 4096;

/// Number of bins used when a request asks for automatic binning:
/// `ceil(max(sqrt(nx * ny), 2))`.
pub fn auto_bin_count(nx: usize, ny: usize) -> usize {
    ((nx as f64 * ny as f64).sqrt().max(2.0)).ceil() as usize
}

/// Bin a plane into `num_bins` counts over `[min_val, max_val]`.
///
/// The bin for value `v` is `clamp(floor((v - min_val) / bin_width), 0,
/// num_bins - 1)`. NaNs are skipped. A degenerate range (`max_val ==
/// min_val`) collapses every finite value into bin 0, and a NaN range
/// (all-NaN plane) yields all-zero bins.
pub fn histogram(
    plane: ArrayView2<'_, f32>,
    min_val: f32,
    max_val: f32,
    num_bins: usize,
) -> Vec<i64> {
    if num_bins == 0 {
        return Vec::new();
    }
    let bin_width = (max_val - min_val) / num_bins as f32;

    match plane.as_slice() {
        Some(data) => data
            .par_chunks(plane.ncols().max(MIN_CHUNK).min(data.len().max(1)))
            .fold(
                || vec![0i64; num_bins],
                |mut bins, chunk| {
                    for &v in chunk {
                        accumulate(&mut bins, v, min_val, bin_width);
                    }
                    bins
                },
            )
            .reduce(
                || vec![0i64; num_bins],
                |mut a, b| {
                    for (acc, count) in a.iter_mut().zip(b) {
                        *acc += count;
                    }
                    a
                },
            ),
        None => {
            let mut bins = vec![0i64; num_bins];
            for &v in plane.iter() {
                accumulate(&mut bins, v, min_val, bin_width);
            }
            bins
        }
    }
}

#[inline]
fn accumulate(bins: &mut [i64], v: f32, min_val: f32, bin_width: f32) {
    if v.is_nan() {
        return;
    }
    let bin = if bin_width > 0.0 {
        (((v - min_val) / bin_width) as i64).clamp(0, bins.len() as i64 - 1) as usize
    } else {
        0
    };
    bins[bin] += 1;
}
