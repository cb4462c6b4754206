//! In-memory image source.
//!
//! `MemorySource` keeps the full cube as a dense `ndarray` array. It backs
//! the test suite and synthetic demo cubes, and doubles as the reference
//! implementation of the [`ImageSource`] contract: every capability,
//! including the optional statistics tables, can be exercised against it.

use std::collections::HashMap;

use async_trait::async_trait;
use ndarray::{Array2, Array4};

use crate::error::SourceError;
use crate::image::shape::{ImageShape, PixelBounds};
use crate::image::source::{ImageSource, StatsTable, SubData};

/// Dense in-memory cube indexed `[stokes, channel, y, x]`.
pub struct MemorySource {
    shape: ImageShape,
    data: Array4<f32>,
    stats: HashMap<SubData, StatsTable>,
    beam_area: Option<f64>,
}

impl MemorySource {
    /// Wrap an existing 4D array. The logical `ndims` is given explicitly
    /// so a `(1, 1, h, w)` array can present itself as a 2D image.
    pub fn new(data: Array4<f32>, ndims: usize) -> Result<Self, SourceError> {
        let (n_stokes, depth, height, width) = data.dim();
        let mut dims = vec![width, height];
        if ndims > 2 {
            dims.push(depth);
        }
        if ndims > 3 {
            dims.push(n_stokes);
        }
        let shape = ImageShape::from_dims(&dims)?;
        if shape.depth != depth || shape.stokes != n_stokes {
            return Err(SourceError::Format(format!(
                "array is {n_stokes}x{depth}x{height}x{width} but ndims is {ndims}"
            )));
        }
        Ok(Self {
            shape,
            data,
            stats: HashMap::new(),
            beam_area: None,
        })
    }

    /// Build a 2D image from a value function of `(x, y)`.
    pub fn from_fn_2d(width: usize, height: usize, f: impl Fn(usize, usize) -> f32) -> Self {
        let data = Array4::from_shape_fn((1, 1, height, width), |(_, _, y, x)| f(x, y));
        Self::new(data, 2).expect("2D shape is valid by construction")
    }

    /// Build a cube from a value function of `(x, y, channel, stokes)`.
    pub fn from_fn_4d(
        width: usize,
        height: usize,
        depth: usize,
        n_stokes: usize,
        f: impl Fn(usize, usize, usize, usize) -> f32,
    ) -> Self {
        let data =
            Array4::from_shape_fn((n_stokes, depth, height, width), |(s, c, y, x)| f(x, y, c, s));
        Self::new(data, 4).expect("4D shape is valid by construction")
    }

    /// Build a 2D image from row-major values (rows top to bottom).
    pub fn from_rows_2d(width: usize, height: usize, values: Vec<f32>) -> Result<Self, SourceError> {
        if values.len() != width * height {
            return Err(SourceError::Format(format!(
                "expected {} values for a {width}x{height} image, got {}",
                width * height,
                values.len()
            )));
        }
        let data = Array4::from_shape_vec((1, 1, height, width), values)
            .map_err(|e| SourceError::Format(e.to_string()))?;
        Self::new(data, 2)
    }

    /// Attach a pre-computed statistics table, as an HDF5-style container
    /// would carry alongside the cube.
    pub fn with_stats(mut self, kind: SubData, table: StatsTable) -> Self {
        self.stats.insert(kind, table);
        self
    }

    /// Attach a restoring-beam area in pixels.
    pub fn with_beam_area(mut self, area: f64) -> Self {
        self.beam_area = Some(area);
        self
    }
}

#[async_trait]
impl ImageSource for MemorySource {
    fn shape(&self) -> &ImageShape {
        &self.shape
    }

    fn has_sub(&self, kind: SubData) -> bool {
        match kind {
            SubData::PrimaryCube => true,
            // The dense array serves channel-first reads directly
            SubData::SwizzledZyx => self.shape.ndims == 3,
            SubData::SwizzledZyxw => self.shape.ndims == 4,
            other => self.stats.contains_key(&other),
        }
    }

    async fn read_slice(
        &self,
        channel: usize,
        stokes: usize,
        bounds: &PixelBounds,
    ) -> Result<Array2<f32>, SourceError> {
        if channel >= self.shape.depth || stokes >= self.shape.stokes {
            return Err(SourceError::SliceOutOfBounds { channel, stokes });
        }
        if bounds.x_max > self.shape.width || bounds.y_max > self.shape.height {
            return Err(SourceError::Format(format!(
                "window ({},{})-({},{}) outside {}x{} plane",
                bounds.x_min, bounds.y_min, bounds.x_max, bounds.y_max,
                self.shape.width, self.shape.height
            )));
        }
        let view = self.data.slice(ndarray::s![
            stokes,
            channel,
            bounds.y_min..bounds.y_max,
            bounds.x_min..bounds.x_max
        ]);
        Ok(view.to_owned())
    }

    fn read_stats(&self, kind: SubData) -> Result<StatsTable, SourceError> {
        self.stats
            .get(&kind)
            .cloned()
            .ok_or(SourceError::MissingStats(match kind {
                SubData::StatsMin => "min",
                SubData::StatsMax => "max",
                SubData::StatsMean => "mean",
                SubData::StatsNanCount => "nan-count",
                SubData::StatsHistogram => "histogram",
                SubData::StatsPercentiles => "percentiles",
                SubData::PercentileRanks => "percentile-ranks",
                _ => "pixel data",
            }))
    }

    fn beam_area(&self) -> Option<f64> {
        self.beam_area
    }
}

// =============================================================================
// Tests
// =============================================================================
