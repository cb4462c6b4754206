//! Histogram and spectral-statistic aggregation for one region.
//!
//! Computed histograms are memoized per channel for the current stokes;
//! changing stokes flushes the memo, so it never holds more than `depth`
//! entries. Geometry changes clear it through [`RegionStats::clear`].

use std::collections::HashMap;

use ndarray::{ArrayView2, ArrayView3, Axis};

use crate::proto::{Histogram, HistogramConfig, StatsType};
use crate::reduce;

/// `HistogramConfig.channel` value selecting the frame's current channel.
pub const CURRENT_CHANNEL: i32 = -1;

/// `HistogramConfig.channel` value selecting every channel of the cube.
pub const ALL_CHANNELS: i32 = -2;

/// `HistogramConfig.num_bins` value selecting automatic binning.
pub const AUTO_BINS: i32 = -1;

#[derive(Debug, Default)]
pub struct RegionStats {
    configs: Vec<HistogramConfig>,
    memo: HashMap<usize, Histogram>,
    memo_stokes: Option<usize>,
}

impl RegionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the requirement list. The memo is kept: a previously cached
    /// channel stays valid if asked for again.
    pub fn set_histogram_configs(&mut self, configs: Vec<HistogramConfig>) {
        self.configs = configs;
    }

    pub fn configs(&self) -> &[HistogramConfig] {
        &self.configs
    }

    /// Bin count requested for `channel`, given the frame's current channel
    /// for resolving `-1` configs. Falls back to automatic binning.
    pub fn num_bins_for(&self, channel: usize, current_channel: usize) -> i32 {
        for config in &self.configs {
            let matches = config.channel == channel as i32
                || config.channel == ALL_CHANNELS
                || (config.channel == CURRENT_CHANNEL && channel == current_channel);
            if matches {
                return config.num_bins;
            }
        }
        AUTO_BINS
    }

    /// Histogram of `plane` for `(channel, stokes)`, served from the memo
    /// when possible.
    pub fn fill_histogram(
        &mut self,
        plane: ArrayView2<'_, f32>,
        channel: usize,
        stokes: usize,
        num_bins: i32,
    ) -> Histogram {
        if self.memo_stokes != Some(stokes) {
            self.memo.clear();
            self.memo_stokes = Some(stokes);
        }
        if let Some(cached) = self.memo.get(&channel) {
            return cached.clone();
        }

        let histogram = compute_histogram(plane, channel, num_bins);
        self.memo.insert(channel, histogram.clone());
        histogram
    }

    /// Seed the memo with a histogram loaded from a container stats table.
    pub fn store_histogram(&mut self, channel: usize, stokes: usize, histogram: Histogram) {
        if self.memo_stokes != Some(stokes) {
            self.memo.clear();
            self.memo_stokes = Some(stokes);
        }
        self.memo.insert(channel, histogram);
    }

    /// Drop the memo entirely; called when geometry, channel range or the
    /// stokes set changes.
    pub fn clear(&mut self) {
        self.memo.clear();
        self.memo_stokes = None;
    }

    /// Per-channel statistic sequences over a region subcube shaped
    /// `(depth, ny, nx)`.
    pub fn spectral_stats(
        subcube: ArrayView3<'_, f32>,
        kinds: &[StatsType],
        beam_area: Option<f64>,
    ) -> Vec<(StatsType, Vec<f32>)> {
        let per_channel: Vec<reduce::ChannelStats> = subcube
            .axis_iter(Axis(0))
            .map(|plane| reduce::channel_stats(plane, beam_area))
            .collect();

        kinds
            .iter()
            .map(|&kind| {
                let values = per_channel
                    .iter()
                    .map(|stats| select_stat(stats, kind) as f32)
                    .collect();
                (kind, values)
            })
            .collect()
    }
}

fn select_stat(stats: &reduce::ChannelStats, kind: StatsType) -> f64 {
    match kind {
        StatsType::Sum => stats.sum,
        StatsType::Flux => stats.flux,
        StatsType::Mean => stats.mean,
        StatsType::Rms => stats.rms,
        StatsType::Sigma => stats.sigma,
        StatsType::SumSq => stats.sum_sq,
        StatsType::Min => stats.min,
        StatsType::Max => stats.max,
    }
}

/// Compute a histogram with the min/max and binning kernels.
pub fn compute_histogram(plane: ArrayView2<'_, f32>, channel: usize, num_bins: i32) -> Histogram {
    let (ny, nx) = plane.dim();
    let num_bins = if num_bins <= 0 {
        reduce::auto_bin_count(nx, ny)
    } else {
        num_bins as usize
    };

    let (min_val, max_val) = reduce::min_max(plane);
    let bins = reduce::histogram(plane, min_val, max_val, num_bins);
    let bin_width = (max_val - min_val) / num_bins as f32;
    Histogram {
        channel: channel as i32,
        num_bins: num_bins as i32,
        bin_width,
        first_bin_center: min_val + bin_width / 2.0,
        bins,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    fn ramp(n: usize) -> Array2<f32> {
        Array2::from_shape_fn((n, n), |(y, x)| (x + y) as f32)
    }

    #[test]
    fn test_fill_histogram_auto_bins() {
        let plane = ramp(64);
        let mut stats = RegionStats::new();
        let histogram = stats.fill_histogram(plane.view(), 0, 0, AUTO_BINS);
        assert_eq!(histogram.num_bins, 64);
        assert_eq!(histogram.bins.iter().sum::<i64>(), 64 * 64);
        assert_eq!(histogram.channel, 0);
        let expected_width = 126.0 / 64.0;
        assert!((histogram.bin_width - expected_width).abs() < 1e-6);
        assert!((histogram.first_bin_center - expected_width / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_memoization_is_byte_stable() {
        let plane = ramp(32);
        let mut stats = RegionStats::new();
        let first = stats.fill_histogram(plane.view(), 0, 0, AUTO_BINS);
        // a different plane must NOT be recomputed for the memoized channel
        let other = Array2::from_elem((32, 32), 9.0f32);
        let second = stats.fill_histogram(other.view(), 0, 0, AUTO_BINS);
        assert_eq!(first, second);
    }

    #[test]
    fn test_memo_flushes_on_stokes_change() {
        let plane = ramp(16);
        let flat = Array2::from_elem((16, 16), 1.0f32);
        let mut stats = RegionStats::new();
        let first = stats.fill_histogram(plane.view(), 0, 0, AUTO_BINS);
        let second = stats.fill_histogram(flat.view(), 0, 1, AUTO_BINS);
        assert_ne!(first, second);
    }

    #[test]
    fn test_clear_drops_memo() {
        let plane = ramp(16);
        let flat = Array2::from_elem((16, 16), 1.0f32);
        let mut stats = RegionStats::new();
        let first = stats.fill_histogram(plane.view(), 0, 0, AUTO_BINS);
        stats.clear();
        let second = stats.fill_histogram(flat.view(), 0, 0, AUTO_BINS);
        assert_ne!(first, second);
    }

    #[test]
    fn test_num_bins_resolution() {
        let mut stats = RegionStats::new();
        stats.set_histogram_configs(vec![
            HistogramConfig {
                channel: 2,
                num_bins: 10,
            },
            HistogramConfig {
                channel: CURRENT_CHANNEL,
                num_bins: 20,
            },
        ]);
        assert_eq!(stats.num_bins_for(2, 5), 10);
        assert_eq!(stats.num_bins_for(5, 5), 20);
        assert_eq!(stats.num_bins_for(7, 5), AUTO_BINS);
    }

    #[test]
    fn test_set_configs_keeps_memo() {
        let plane = ramp(16);
        let flat = Array2::from_elem((16, 16), 1.0f32);
        let mut stats = RegionStats::new();
        let first = stats.fill_histogram(plane.view(), 0, 0, AUTO_BINS);
        stats.set_histogram_configs(vec![HistogramConfig {
            channel: 0,
            num_bins: 4,
        }]);
        let second = stats.fill_histogram(flat.view(), 0, 0, 4);
        assert_eq!(first, second);
    }

    #[test]
    fn test_spectral_stats_shapes_and_values() {
        // 3 channels of 2x2: channel c holds value c+1 with one NaN in channel 2
        let mut cube = Array3::from_shape_fn((3, 2, 2), |(c, _, _)| (c + 1) as f32);
        cube[[2, 0, 0]] = f32::NAN;

        let results = RegionStats::spectral_stats(
            cube.view(),
            &[StatsType::Sum, StatsType::Mean, StatsType::Max],
            None,
        );
        assert_eq!(results.len(), 3);
        let (_, sums) = &results[0];
        assert_eq!(sums.as_slice(), &[4.0, 8.0, 9.0]);
        let (_, means) = &results[1];
        assert_eq!(means.as_slice(), &[1.0, 2.0, 3.0]);
        let (_, maxes) = &results[2];
        assert_eq!(maxes.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_spectral_stats_empty_channel_is_nan() {
        let cube = Array3::from_elem((2, 1, 1), f32::NAN);
        let results = RegionStats::spectral_stats(cube.view(), &[StatsType::Mean], None);
        assert!(results[0].1.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_all_nan_histogram_is_empty() {
        let plane = Array2::from_elem((4, 4), f32::NAN);
        let histogram = compute_histogram(plane.view(), 0, 4);
        assert_eq!(histogram.bins, vec![0, 0, 0, 0]);
    }
}
