//! Region: geometry plus its stats and profiler.
//!
//! A region composes [`RegionGeometry`], [`RegionStats`] and
//! [`RegionProfiler`] and forwards to them; it never reaches back into the
//! frame that owns it. Any geometry mutation that actually changes the
//! region flushes the stats memo.

use crate::proto::RegionType;
use crate::region::geometry::RegionGeometry;
use crate::region::profiler::RegionProfiler;
use crate::region::stats::RegionStats;

/// Reserved id of the automatic whole-image region.
pub const WHOLE_IMAGE_REGION_ID: i32 = -1;

/// Reserved id of the cursor region (always a point).
pub const CURSOR_REGION_ID: i32 = 0;

#[derive(Debug)]
pub struct Region {
    name: String,
    geometry: RegionGeometry,
    channel_range: (i32, i32),
    stokes_set: Vec<i32>,
    stats: RegionStats,
    profiler: RegionProfiler,
}

impl Region {
    pub fn new(name: impl Into<String>, kind: RegionType) -> Self {
        Self {
            name: name.into(),
            geometry: RegionGeometry::new(kind),
            channel_range: (0, 0),
            stokes_set: Vec::new(),
            stats: RegionStats::new(),
            profiler: RegionProfiler::new(),
        }
    }

    /// The automatic region covering the full image, created at open time.
    pub fn whole_image() -> Self {
        let mut region = Self::new("", RegionType::WholeImage);
        region.geometry = RegionGeometry::whole_image();
        region
    }

    /// The cursor region at a point.
    pub fn cursor(x: f64, y: f64) -> Self {
        let mut region = Self::new("cursor", RegionType::Point);
        region.geometry = RegionGeometry::point(x, y);
        region
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RegionType {
        self.geometry.kind
    }

    pub fn geometry(&self) -> &RegionGeometry {
        &self.geometry
    }

    pub fn channel_range(&self) -> (i32, i32) {
        self.channel_range
    }

    pub fn stokes_set(&self) -> &[i32] {
        &self.stokes_set
    }

    /// Replace the channel range and stokes set; flushes the stats memo
    /// when the values change.
    pub fn set_channels(&mut self, min_channel: i32, max_channel: i32, stokes: Vec<i32>) {
        let changed = self.channel_range != (min_channel, max_channel) || self.stokes_set != stokes;
        self.channel_range = (min_channel, max_channel);
        self.stokes_set = stokes;
        if changed {
            self.stats.clear();
        }
    }

    /// Replace the region type; flushes the stats memo when it changes.
    pub fn set_kind(&mut self, kind: RegionType) {
        if self.geometry.kind != kind {
            self.geometry.kind = kind;
            self.stats.clear();
        }
    }

    /// Replace the control points; flushes the stats memo when they change.
    pub fn set_control_points(&mut self, points: Vec<(f64, f64)>) {
        if self.geometry.control_points != points {
            self.geometry.control_points = points;
            self.stats.clear();
        }
    }

    /// Replace the rotation; flushes the stats memo when it changes.
    pub fn set_rotation(&mut self, rotation_deg: f32) {
        if self.geometry.rotation_deg != rotation_deg {
            self.geometry.rotation_deg = rotation_deg;
            self.stats.clear();
        }
    }

    pub fn control_point(&self, index: usize) -> Option<(f64, f64)> {
        self.geometry.control_points.get(index).copied()
    }

    pub fn stats(&mut self) -> &mut RegionStats {
        &mut self.stats
    }

    pub fn stats_ref(&self) -> &RegionStats {
        &self.stats
    }

    pub fn profiler(&mut self) -> &mut RegionProfiler {
        &mut self.profiler
    }

    pub fn profiler_ref(&self) -> &RegionProfiler {
        &self.profiler
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::stats::AUTO_BINS;
    use ndarray::Array2;

    #[test]
    fn test_geometry_change_clears_memo() {
        let ramp = Array2::from_shape_fn((8, 8), |(y, x)| (x + y) as f32);
        let flat = Array2::from_elem((8, 8), 2.0f32);

        let mut region = Region::cursor(1.0, 1.0);
        let first = region.stats().fill_histogram(ramp.view(), 0, 0, AUTO_BINS);

        region.set_control_points(vec![(2.0, 2.0)]);
        let second = region.stats().fill_histogram(flat.view(), 0, 0, AUTO_BINS);
        assert_ne!(first, second);
    }

    #[test]
    fn test_unchanged_geometry_keeps_memo() {
        let ramp = Array2::from_shape_fn((8, 8), |(y, x)| (x + y) as f32);
        let flat = Array2::from_elem((8, 8), 2.0f32);

        let mut region = Region::cursor(1.0, 1.0);
        let first = region.stats().fill_histogram(ramp.view(), 0, 0, AUTO_BINS);

        region.set_control_points(vec![(1.0, 1.0)]);
        region.set_rotation(0.0);
        let second = region.stats().fill_histogram(flat.view(), 0, 0, AUTO_BINS);
        assert_eq!(first, second);
    }

    #[test]
    fn test_channel_range_change_clears_memo() {
        let ramp = Array2::from_shape_fn((8, 8), |(y, x)| (x * y) as f32);
        let flat = Array2::from_elem((8, 8), 1.0f32);

        let mut region = Region::new("r", RegionType::Rectangle);
        let first = region.stats().fill_histogram(ramp.view(), 0, 0, AUTO_BINS);
        region.set_channels(0, 5, vec![0]);
        let second = region.stats().fill_histogram(flat.view(), 0, 0, AUTO_BINS);
        assert_ne!(first, second);
    }

    #[test]
    fn test_cursor_is_point() {
        let region = Region::cursor(3.0, 4.0);
        assert_eq!(region.kind(), RegionType::Point);
        assert_eq!(region.control_point(0), Some((3.0, 4.0)));
    }
}
