//! Per-channel statistics for spectral profiles.

use ndarray::ArrayView2;
use rayon::prelude::*;

const MIN_CHUNK: usize = 4096;

/// One-pass reduction of a region plane for a single channel.
///
/// All derived quantities are NaN when the plane holds no finite values,
/// and `sigma` additionally needs at least two of them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub n_finite: u64,
    pub sum: f64,
    pub sum_sq: f64,
    pub mean: f64,
    pub sigma: f64,
    pub rms: f64,
    pub min: f64,
    pub max: f64,
    /// `sum / beam_area` when beam metadata is present, else equal to `sum`
    pub flux: f64,
}

#[derive(Clone, Copy)]
struct Accum {
    n: u64,
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
}

impl Accum {
    fn empty() -> Self {
        Self {
            n: 0,
            sum: 0.0,
            sum_sq: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn push(mut self, v: f32) -> Self {
        if !v.is_nan() {
            let v = v as f64;
            self.n += 1;
            self.sum += v;
            self.sum_sq += v * v;
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
        self
    }

    fn merge(mut self, other: Self) -> Self {
        self.n += other.n;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self
    }
}

/// Reduce one channel plane of a region subcube.
pub fn channel_stats(plane: ArrayView2<'_, f32>, beam_area: Option<f64>) -> ChannelStats {
    let acc = match plane.as_slice() {
        Some(data) => data
            .par_chunks(plane.ncols().max(MIN_CHUNK).min(data.len().max(1)))
            .map(|chunk| chunk.iter().copied().fold(Accum::empty(), Accum::push))
            .reduce(Accum::empty, Accum::merge),
        None => plane.iter().copied().fold(Accum::empty(), Accum::push),
    };

    if acc.n == 0 {
        return ChannelStats {
            n_finite: 0,
            sum: f64::NAN,
            sum_sq: f64::NAN,
            mean: f64::NAN,
            sigma: f64::NAN,
            rms: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
            flux: f64::NAN,
        };
    }

    let n = acc.n as f64;
    let mean = acc.sum / n;
    let sigma = if acc.n > 1 {
        ((acc.sum_sq - n * mean * mean) / (n - 1.0)).max(0.0).sqrt()
    } else {
        f64::NAN
    };
    ChannelStats {
        n_finite: acc.n,
        sum: acc.sum,
        sum_sq: acc.sum_sq,
        mean,
        sigma,
        rms: (acc.sum_sq / n).sqrt(),
        min: acc.min,
        max: acc.max,
        flux: match beam_area {
            Some(area) if area > 0.0 => acc.sum / area,
            _ => acc.sum,
        },
    }
}
