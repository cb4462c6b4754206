//! NaN-aware parallel min/max reduction.

use ndarray::ArrayView2;
use rayon::prelude::*;

/// Minimum slice length per parallel work item; keeps rayon overhead small
/// relative to the scan itself.
const MIN_CHUNK: usize = 4096;

/// Minimum and maximum of a plane, ignoring NaNs.
///
/// Returns `(NaN, NaN)` when every element is NaN; downstream treats that
/// as an empty histogram. The reduction is associative and commutative, so
/// the result is identical under any tiling and under serial execution.
pub fn min_max(plane: ArrayView2<'_, f32>) -> (f32, f32) {
    let (min, max) = match plane.as_slice() {
        Some(data) => data
            .par_chunks(chunk_len(plane.ncols(), data.len()))
            .map(slice_min_max)
            .reduce(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |a, b| (a.0.min(b.0), a.1.max(b.1)),
            ),
        None => plane
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |acc, &v| fold_value(acc, v)),
    };
    if min > max {
        (f32::NAN, f32::NAN)
    } else {
        (min, max)
    }
}

/// Number of NaN pixels in a plane.
pub fn nan_count(plane: ArrayView2<'_, f32>) -> usize {
    match plane.as_slice() {
        Some(data) => data
            .par_chunks(chunk_len(plane.ncols(), data.len()))
            .map(|chunk| chunk.iter().filter(|v| v.is_nan()).count())
            .sum(),
        None => plane.iter().filter(|v| v.is_nan()).count(),
    }
}

fn chunk_len(ncols: usize, total: usize) -> usize {
    ncols.max(MIN_CHUNK).min(total.max(1))
}

fn slice_min_max(chunk: &[f32]) -> (f32, f32) {
    chunk
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |acc, &v| fold_value(acc, v))
}

fn fold_value(acc: (f32, f32), v: f32) -> (f32, f32) {
    // f32::min/max propagate the non-NaN operand, so NaNs fall out here
    (acc.0.min(v), acc.1.max(v))
}
