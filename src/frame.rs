//! Frame: the per-file view state machine.
//!
//! A frame owns one [`ImageSource`], the current `(channel, stokes, bounds,
//! mip)` tuple, the cached 2D slice of the current plane, and the regions
//! defined on it. Mutations validate first and leave state untouched on
//! failure; raster and histogram reads always reflect the tuple as last
//! accepted.

use std::collections::HashMap;

use ndarray::{s, Array2, Array3, ArrayView2, Axis};
use tracing::{debug, warn};

use crate::error::FrameError;
use crate::image::{ImageShape, ImageSource, PixelBounds, SubData};
use crate::proto::{
    Histogram, HistogramConfig, RegionHistogramData, RegionType, SpatialProfileData,
    SpectralProfile, SpectralProfileData,
};
use crate::region::{
    profile_along, Region, RegionGeometry, RegionStats, ALL_CHANNELS, AUTO_BINS, CURRENT_CHANNEL,
    CURSOR_REGION_ID, WHOLE_IMAGE_REGION_ID,
};
use crate::reduce;

// =============================================================================
// Pre-computed plane statistics
// =============================================================================

#[derive(Debug, Clone, Default)]
struct PlaneStats {
    min_val: f32,
    max_val: f32,
    bins: Vec<i64>,
}

/// Per-plane statistics loaded from container stats tables, keyed
/// `[stokes][channel]`.
#[derive(Debug)]
struct PlaneStatsTable {
    stats: Vec<Vec<PlaneStats>>,
}

impl PlaneStatsTable {
    fn get(&self, stokes: usize, channel: usize) -> Option<&PlaneStats> {
        self.stats
            .get(stokes)
            .and_then(|row| row.get(channel))
            .filter(|s| !s.bins.is_empty())
    }
}

/// A plane that is either borrowed from the slice cache or freshly read.
enum PlaneRef<'a> {
    Borrowed(ArrayView2<'a, f32>),
    Owned(Array2<f32>),
}

impl PlaneRef<'_> {
    fn view(&self) -> ArrayView2<'_, f32> {
        match self {
            PlaneRef::Borrowed(view) => view.reborrow(),
            PlaneRef::Owned(array) => array.view(),
        }
    }
}

// =============================================================================
// Frame
// =============================================================================

pub struct Frame {
    session_id: String,
    source: Box<dyn ImageSource>,
    shape: ImageShape,
    channel: usize,
    stokes: usize,
    bounds: PixelBounds,
    mip: usize,
    slice_cache: Option<Array2<f32>>,
    regions: HashMap<i32, Region>,
    plane_stats: Option<PlaneStatsTable>,
}

impl Frame {
    /// Open a frame over a source, slice the default plane and install the
    /// automatic whole-image region.
    pub async fn open(
        session_id: String,
        source: Box<dyn ImageSource>,
        default_channel: usize,
    ) -> Result<Self, FrameError> {
        let shape = *source.shape();
        debug!(
            session = %session_id,
            width = shape.width,
            height = shape.height,
            depth = shape.depth,
            stokes = shape.stokes,
            "opening image"
        );

        // Swizzled copies speed up spectral reads when present; their
        // absence just falls back to plane-by-plane slicing.
        let swizzled = match shape.ndims {
            3 => source.has_sub(SubData::SwizzledZyx),
            4 => source.has_sub(SubData::SwizzledZyxw),
            _ => false,
        };
        if shape.ndims > 2 && !swizzled {
            debug!(session = %session_id, "no swizzled data set, using fallback spectral reads");
        }

        let plane_stats = load_plane_stats(source.as_ref(), &shape, &session_id);

        let mut whole = Region::whole_image();
        whole.stats().set_histogram_configs(vec![HistogramConfig {
            channel: CURRENT_CHANNEL,
            num_bins: AUTO_BINS,
        }]);
        let mut regions = HashMap::new();
        regions.insert(WHOLE_IMAGE_REGION_ID, whole);

        let mut frame = Self {
            session_id,
            source,
            shape,
            channel: 0,
            stokes: 0,
            bounds: shape.full_bounds(),
            mip: 1,
            slice_cache: None,
            regions,
            plane_stats,
        };
        frame.set_channels(default_channel as i32, 0).await?;
        Ok(frame)
    }

    pub fn shape(&self) -> &ImageShape {
        &self.shape
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn stokes(&self) -> usize {
        self.stokes
    }

    pub fn bounds(&self) -> PixelBounds {
        self.bounds
    }

    pub fn mip(&self) -> usize {
        self.mip
    }

    /// Release the slice cache and all regions; the frame is unusable
    /// afterwards.
    pub fn close(&mut self) {
        self.slice_cache = None;
        self.regions.clear();
    }

    // =========================================================================
    // State transitions
    // =========================================================================

    /// Switch to a new (channel, stokes) plane and re-fill the slice cache.
    pub async fn set_channels(&mut self, channel: i32, stokes: i32) -> Result<(), FrameError> {
        if channel < 0 || channel as usize >= self.shape.depth {
            return Err(FrameError::InvalidChannel {
                channel,
                depth: self.shape.depth,
            });
        }
        if stokes < 0 || stokes as usize >= self.shape.stokes {
            return Err(FrameError::InvalidStokes {
                stokes,
                n_stokes: self.shape.stokes,
            });
        }

        let plane = self
            .source
            .read_slice(channel as usize, stokes as usize, &self.shape.full_bounds())
            .await?;
        let (rows, cols) = plane.dim();
        if rows != self.shape.height || cols != self.shape.width {
            return Err(FrameError::CorruptSliceCache {
                rows,
                cols,
                width: self.shape.width,
                height: self.shape.height,
            });
        }

        self.slice_cache = Some(plane);
        self.channel = channel as usize;
        self.stokes = stokes as usize;
        Ok(())
    }

    /// Update the view bounds and mip. The slice cache is per plane, not
    /// per view, so it stays valid; non-multiple bounds are truncated.
    pub fn set_bounds(&mut self, bounds: PixelBounds, mip: i32) -> Result<(), FrameError> {
        if mip < 1 || mip as usize > self.shape.width.min(self.shape.height) {
            return Err(FrameError::InvalidMip {
                mip,
                width: self.shape.width,
                height: self.shape.height,
            });
        }
        let (truncated, dropped) = bounds.truncate_to_mip(mip as usize);
        if dropped {
            debug!(
                session = %self.session_id,
                mip,
                width = truncated.width(),
                height = truncated.height(),
                "view bounds truncated to a mip multiple"
            );
        }
        if truncated.is_empty() {
            return Err(FrameError::BoundsOutOfImage {
                x_min: bounds.x_min as i32,
                y_min: bounds.y_min as i32,
                x_max: bounds.x_max as i32,
                y_max: bounds.y_max as i32,
                width: self.shape.width,
                height: self.shape.height,
            });
        }
        self.bounds = truncated;
        self.mip = mip as usize;
        Ok(())
    }

    // =========================================================================
    // Raster data
    // =========================================================================

    /// Downsample the current view into a contiguous row-major buffer of
    /// `(w / mip) * (h / mip)` floats, top row first.
    pub fn get_image_data(&self, mean_filter: bool) -> Result<Vec<f32>, FrameError> {
        let cache = self.slice_cache.as_ref().ok_or(FrameError::NoPlane)?;
        self.check_cache(cache)?;

        let b = &self.bounds;
        let view = cache.slice(s![b.y_min..b.y_max, b.x_min..b.x_max]);
        let out = if mean_filter && self.mip > 1 {
            reduce::mean_pool(view, self.mip)
        } else if self.mip > 1 {
            reduce::nearest(view, self.mip)
        } else {
            view.to_owned()
        };
        Ok(out.into_raw_vec())
    }

    /// Output row length of the current view after downsampling.
    pub fn row_length(&self) -> usize {
        self.bounds.width() / self.mip
    }

    /// Output row count of the current view after downsampling.
    pub fn num_rows(&self) -> usize {
        self.bounds.height() / self.mip
    }

    // =========================================================================
    // Histograms
    // =========================================================================

    /// Histogram of the current plane, from the whole-image region's memo,
    /// the container's stats tables, or a fresh parallel reduction.
    pub fn current_plane_histogram(&mut self) -> Result<Histogram, FrameError> {
        let cache = self.slice_cache.take().ok_or(FrameError::NoPlane)?;
        self.check_cache(&cache)?;

        let (channel, stokes) = (self.channel, self.stokes);
        let stored = self
            .plane_stats
            .as_ref()
            .and_then(|table| table.get(stokes, channel))
            .map(|stats| histogram_from_stats(stats, channel));

        let region = self
            .regions
            .get_mut(&WHOLE_IMAGE_REGION_ID)
            .ok_or(FrameError::RegionNotFound {
                region_id: WHOLE_IMAGE_REGION_ID,
            });
        let result = region.map(|region| match stored {
            Some(histogram) => {
                region.stats().store_histogram(channel, stokes, histogram.clone());
                histogram
            }
            None => {
                let num_bins = region.stats_ref().num_bins_for(channel, channel);
                region
                    .stats()
                    .fill_histogram(cache.view(), channel, stokes, num_bins)
            }
        });
        self.slice_cache = Some(cache);
        result
    }

    /// Histograms for a region's configured requirements; `-1` resolves to
    /// the current channel and `-2` to every channel of the cube.
    pub async fn region_histogram_data(
        &mut self,
        region_id: i32,
    ) -> Result<RegionHistogramData, FrameError> {
        let mut region = self
            .regions
            .remove(&region_id)
            .ok_or(FrameError::RegionNotFound { region_id })?;
        let result = self.region_histograms_inner(region_id, &mut region).await;
        self.regions.insert(region_id, region);
        result
    }

    async fn region_histograms_inner(
        &mut self,
        region_id: i32,
        region: &mut Region,
    ) -> Result<RegionHistogramData, FrameError> {
        let configs: Vec<HistogramConfig> = region.stats_ref().configs().to_vec();
        let mut histograms = Vec::new();

        for config in &configs {
            let channels: Vec<usize> = match config.channel {
                CURRENT_CHANNEL => vec![self.channel],
                ALL_CHANNELS => (0..self.shape.depth).collect(),
                c if c >= 0 && (c as usize) < self.shape.depth => vec![c as usize],
                c => {
                    warn!(
                        session = %self.session_id,
                        channel = c,
                        "dropping histogram config with out-of-range channel"
                    );
                    continue;
                }
            };

            for channel in channels {
                let plane = self
                    .region_plane(region.geometry(), channel, self.stokes)
                    .await?;
                let histogram = region.stats().fill_histogram(
                    plane.view(),
                    channel,
                    self.stokes,
                    config.num_bins,
                );
                histograms.push(histogram);
            }
        }

        Ok(RegionHistogramData {
            file_id: 0,
            region_id,
            stokes: self.stokes as i32,
            histograms,
        })
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Cursor value and the registered spatial profiles for a point region.
    pub async fn spatial_profile_data(
        &mut self,
        region_id: i32,
    ) -> Result<SpatialProfileData, FrameError> {
        let region = self
            .regions
            .get(&region_id)
            .ok_or(FrameError::RegionNotFound { region_id })?;
        let (cx, cy) = self.cursor_position(region)?;
        let requests = region.profiler_ref().spatial_requests().to_vec();

        let cache = self.slice_cache.as_ref().ok_or(FrameError::NoPlane)?;
        let value = cache[[cy, cx]];

        let mut profiles = Vec::with_capacity(requests.len());
        for request in &requests {
            if request.stokes == self.stokes {
                profiles.push(profile_along(
                    cache.view(),
                    request.axis,
                    &request.coordinate,
                    cx,
                    cy,
                ));
            } else {
                // stokes-mixed request: slice the other polarization plane
                let plane = self
                    .source
                    .read_slice(self.channel, request.stokes, &self.shape.full_bounds())
                    .await?;
                profiles.push(profile_along(
                    plane.view(),
                    request.axis,
                    &request.coordinate,
                    cx,
                    cy,
                ));
            }
        }

        Ok(SpatialProfileData {
            file_id: 0,
            region_id,
            x: cx as i32,
            y: cy as i32,
            channel: self.channel as i32,
            stokes: self.stokes as i32,
            value,
            profiles,
        })
    }

    /// Spectral statistic profiles over the region's subcube.
    pub async fn spectral_profile_data(
        &mut self,
        region_id: i32,
    ) -> Result<SpectralProfileData, FrameError> {
        let region = self
            .regions
            .get(&region_id)
            .ok_or(FrameError::RegionNotFound { region_id })?;
        let geometry = region.geometry().clone();
        let requests = region.profiler_ref().spectral_requests().to_vec();

        let mut profiles = Vec::new();
        for request in &requests {
            let subcube = self.region_subcube(&geometry, request.stokes).await?;
            let stats =
                RegionStats::spectral_stats(subcube.view(), &request.stats, self.source.beam_area());
            for (kind, values) in stats {
                profiles.push(SpectralProfile {
                    coordinate: request.coordinate.clone(),
                    stats_type: kind as i32,
                    values,
                });
            }
        }

        Ok(SpectralProfileData {
            file_id: 0,
            region_id,
            stokes: self.stokes as i32,
            profiles,
        })
    }

    // =========================================================================
    // Region management
    // =========================================================================

    /// Create or update a region; geometry changes flush its stats memo.
    pub fn set_region(
        &mut self,
        region_id: i32,
        name: &str,
        kind: RegionType,
        points: Vec<(f64, f64)>,
        rotation_deg: f32,
        channel_min: i32,
        channel_max: i32,
        stokes_set: Vec<i32>,
    ) -> Result<(), FrameError> {
        if region_id == WHOLE_IMAGE_REGION_ID {
            return Err(FrameError::RegionNotFound { region_id });
        }
        if region_id == CURSOR_REGION_ID && kind != RegionType::Point {
            return Err(FrameError::RegionNotFound { region_id });
        }
        let region = self
            .regions
            .entry(region_id)
            .or_insert_with(|| Region::new(name, kind));
        region.set_kind(kind);
        region.set_control_points(points);
        region.set_rotation(rotation_deg);
        region.set_channels(channel_min, channel_max, stokes_set);
        Ok(())
    }

    /// Move the cursor region, creating it on first use.
    pub fn set_cursor(&mut self, x: f64, y: f64) {
        self.regions
            .entry(CURSOR_REGION_ID)
            .or_insert_with(|| Region::cursor(x, y))
            .set_control_points(vec![(x, y)]);
    }

    /// Remove a region; unknown and reserved ids are ignored.
    pub fn remove_region(&mut self, region_id: i32) {
        if region_id != WHOLE_IMAGE_REGION_ID {
            self.regions.remove(&region_id);
        }
    }

    pub fn region_mut(&mut self, region_id: i32) -> Option<&mut Region> {
        self.regions.get_mut(&region_id)
    }

    pub fn region_ref(&self, region_id: i32) -> Option<&Region> {
        self.regions.get(&region_id)
    }

    pub fn has_region(&self, region_id: i32) -> bool {
        self.regions.contains_key(&region_id)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_cache(&self, cache: &Array2<f32>) -> Result<(), FrameError> {
        let (rows, cols) = cache.dim();
        if rows != self.shape.height || cols != self.shape.width {
            return Err(FrameError::CorruptSliceCache {
                rows,
                cols,
                width: self.shape.width,
                height: self.shape.height,
            });
        }
        Ok(())
    }

    fn cursor_position(&self, region: &Region) -> Result<(usize, usize), FrameError> {
        let (x, y) = region
            .control_point(0)
            .ok_or(FrameError::RegionNotFound {
                region_id: CURSOR_REGION_ID,
            })?;
        let (cx, cy) = (x.floor(), y.floor());
        if cx < 0.0 || cy < 0.0 || cx >= self.shape.width as f64 || cy >= self.shape.height as f64 {
            return Err(FrameError::BoundsOutOfImage {
                x_min: cx as i32,
                y_min: cy as i32,
                x_max: cx as i32,
                y_max: cy as i32,
                width: self.shape.width,
                height: self.shape.height,
            });
        }
        Ok((cx as usize, cy as usize))
    }

    /// Pixels of `geometry` on one plane: the full plane for the whole
    /// image, a single pixel for a point, and a bounding-box window with
    /// NaN outside the shape for everything else.
    async fn region_plane(
        &self,
        geometry: &RegionGeometry,
        channel: usize,
        stokes: usize,
    ) -> Result<PlaneRef<'_>, FrameError> {
        let use_cache = channel == self.channel && stokes == self.stokes;

        if geometry.kind == RegionType::WholeImage {
            return if use_cache {
                let cache = self.slice_cache.as_ref().ok_or(FrameError::NoPlane)?;
                Ok(PlaneRef::Borrowed(cache.view()))
            } else {
                let plane = self
                    .source
                    .read_slice(channel, stokes, &self.shape.full_bounds())
                    .await?;
                Ok(PlaneRef::Owned(plane))
            };
        }

        let Some(bbox) = geometry.bounding_box(&self.shape) else {
            return Ok(PlaneRef::Owned(Array2::zeros((0, 0))));
        };

        let mut window = if use_cache {
            let cache = self.slice_cache.as_ref().ok_or(FrameError::NoPlane)?;
            cache
                .slice(s![bbox.y_min..bbox.y_max, bbox.x_min..bbox.x_max])
                .to_owned()
        } else {
            self.source.read_slice(channel, stokes, &bbox).await?
        };

        mask_outside(&mut window, geometry, &bbox);
        Ok(PlaneRef::Owned(window))
    }

    /// Region subcube shaped `(depth, ny, nx)` for one stokes.
    async fn region_subcube(
        &self,
        geometry: &RegionGeometry,
        stokes: usize,
    ) -> Result<Array3<f32>, FrameError> {
        let bbox = match geometry.kind {
            RegionType::WholeImage => self.shape.full_bounds(),
            _ => geometry
                .bounding_box(&self.shape)
                .unwrap_or(PixelBounds::default()),
        };
        if bbox.is_empty() {
            return Ok(Array3::zeros((self.shape.depth, 0, 0)));
        }

        let mut subcube = Array3::zeros((self.shape.depth, bbox.height(), bbox.width()));
        for channel in 0..self.shape.depth {
            let mut window = self.source.read_slice(channel, stokes, &bbox).await?;
            if geometry.kind != RegionType::WholeImage {
                mask_outside(&mut window, geometry, &bbox);
            }
            subcube.index_axis_mut(Axis(0), channel).assign(&window);
        }
        Ok(subcube)
    }
}

/// NaN-mask window pixels that fall outside the region shape.
fn mask_outside(window: &mut Array2<f32>, geometry: &RegionGeometry, bbox: &PixelBounds) {
    if geometry.kind == RegionType::Point {
        return;
    }
    if geometry.kind == RegionType::Rectangle && geometry.rotation_deg == 0.0 {
        // an axis-aligned rectangle is exactly its bounding window
        return;
    }
    for ((wy, wx), value) in window.indexed_iter_mut() {
        let x = (bbox.x_min + wx) as f64;
        let y = (bbox.y_min + wy) as f64;
        if !geometry.contains(x, y) {
            *value = f32::NAN;
        }
    }
}

fn histogram_from_stats(stats: &PlaneStats, channel: usize) -> Histogram {
    let num_bins = stats.bins.len() as i32;
    let bin_width = (stats.max_val - stats.min_val) / num_bins.max(1) as f32;
    Histogram {
        channel: channel as i32,
        num_bins,
        bin_width,
        first_bin_center: stats.min_val + bin_width / 2.0,
        bins: stats.bins.clone(),
    }
}

/// Load the per-plane statistics tables a container may carry.
///
/// Absence is silent; tables whose shape disagrees with the image are
/// logged and ignored, which sends those histograms down the on-the-fly
/// path instead.
fn load_plane_stats(
    source: &dyn ImageSource,
    shape: &ImageShape,
    session_id: &str,
) -> Option<PlaneStatsTable> {
    let required = [
        SubData::StatsMin,
        SubData::StatsMax,
        SubData::StatsHistogram,
    ];
    if !required.iter().all(|&kind| source.has_sub(kind)) {
        return None;
    }

    let mins = source.read_stats(SubData::StatsMin).ok()?;
    let maxes = source.read_stats(SubData::StatsMax).ok()?;
    let hist = source.read_stats(SubData::StatsHistogram).ok()?;

    let planes = shape.stokes * shape.depth;
    let num_bins = match hist.dims.last() {
        Some(&n) if n > 0 && hist.values.len() == planes * n => n,
        _ => {
            warn!(session = %session_id, "histogram stats table has an invalid shape, ignoring");
            return None;
        }
    };
    if mins.values.len() != planes || maxes.values.len() != planes {
        warn!(session = %session_id, "min/max stats tables have invalid shapes, ignoring");
        return None;
    }

    let mut stats = vec![vec![PlaneStats::default(); shape.depth]; shape.stokes];
    for s in 0..shape.stokes {
        for c in 0..shape.depth {
            let plane = s * shape.depth + c;
            let bins = hist.values[plane * num_bins..(plane + 1) * num_bins]
                .iter()
                .map(|&v| v as i64)
                .collect();
            stats[s][c] = PlaneStats {
                min_val: mins.values[plane],
                max_val: maxes.values[plane],
                bins,
            };
        }
    }
    debug!(session = %session_id, "loaded per-plane statistics tables");
    Some(PlaneStatsTable { stats })
}

// =============================================================================
// Tests
// =============================================================================
