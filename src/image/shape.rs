//! Image shape and pixel-bounds types shared by the whole pipeline.

use crate::error::{FrameError, SourceError};

// =============================================================================
// Image Shape
// =============================================================================

/// Dimensions of an opened image cube.
///
/// `depth` and `stokes` are 1 when the corresponding axis is absent.
/// `ndims` is fixed at open time and is always 2, 3 or 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageShape {
    /// Width of the spatial plane in pixels (X axis)
    pub width: usize,

    /// Height of the spatial plane in pixels (Y axis)
    pub height: usize,

    /// Number of spectral channels (1 when the axis is absent)
    pub depth: usize,

    /// Number of polarization planes (1 when the axis is absent)
    pub stokes: usize,

    /// Number of axes in the underlying container (2, 3 or 4)
    pub ndims: usize,
}

impl ImageShape {
    /// Build a shape from the raw axis lengths of a container.
    ///
    /// Axis order is (X, Y, Z, W): width, height, spectral, polarization.
    /// Fails with `DimensionError` when the container is not 2D-4D, and
    /// with `FormatError` when a plane would not fit in 63 bits.
    pub fn from_dims(dims: &[usize]) -> Result<Self, SourceError> {
        let ndims = dims.len();
        if !(2..=4).contains(&ndims) {
            return Err(SourceError::Dimension { ndims });
        }

        let width = dims[0];
        let height = dims[1];
        if width == 0 || height == 0 {
            return Err(SourceError::Format("image has an empty spatial axis".into()));
        }
        // width * height must fit in 63 bits so pixel counts stay addressable
        if (width as u128) * (height as u128) > (i64::MAX as u128) {
            return Err(SourceError::Format(format!(
                "plane of {width}x{height} pixels is too large"
            )));
        }

        Ok(Self {
            width,
            height,
            depth: if ndims > 2 { dims[2].max(1) } else { 1 },
            stokes: if ndims > 3 { dims[3].max(1) } else { 1 },
            ndims,
        })
    }

    /// Number of pixels in one (channel, stokes) plane.
    pub fn plane_len(&self) -> usize {
        self.width * self.height
    }

    /// Bounds covering the full spatial plane.
    pub fn full_bounds(&self) -> PixelBounds {
        PixelBounds {
            x_min: 0,
            y_min: 0,
            x_max: self.width,
            y_max: self.height,
        }
    }
}

// =============================================================================
// Pixel Bounds
// =============================================================================

/// Half-open rectangular view `[x_min, x_max) x [y_min, y_max)` on a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelBounds {
    pub x_min: usize,
    pub y_min: usize,
    pub x_max: usize,
    pub y_max: usize,
}

impl PixelBounds {
    /// Validate raw wire coordinates against an image shape.
    ///
    /// Requires `0 <= min < max <= axis length` on both axes.
    pub fn from_wire(
        x_min: i32,
        y_min: i32,
        x_max: i32,
        y_max: i32,
        shape: &ImageShape,
    ) -> Result<Self, FrameError> {
        let valid = x_min >= 0
            && y_min >= 0
            && x_min < x_max
            && y_min < y_max
            && x_max as usize <= shape.width
            && y_max as usize <= shape.height;
        if !valid {
            return Err(FrameError::BoundsOutOfImage {
                x_min,
                y_min,
                x_max,
                y_max,
                width: shape.width,
                height: shape.height,
            });
        }
        Ok(Self {
            x_min: x_min as usize,
            y_min: y_min as usize,
            x_max: x_max as usize,
            y_max: y_max as usize,
        })
    }

    pub fn width(&self) -> usize {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> usize {
        self.y_max - self.y_min
    }

    pub fn is_empty(&self) -> bool {
        self.x_max <= self.x_min || self.y_max <= self.y_min
    }

    /// Shrink the view so both dimensions are multiples of `mip`.
    ///
    /// Returns the truncated bounds and whether any pixels were dropped.
    pub fn truncate_to_mip(&self, mip: usize) -> (Self, bool) {
        let w = (self.width() / mip) * mip;
        let h = (self.height() / mip) * mip;
        let truncated = Self {
            x_min: self.x_min,
            y_min: self.y_min,
            x_max: self.x_min + w,
            y_max: self.y_min + h,
        };
        (truncated, w != self.width() || h != self.height())
    }
}

// =============================================================================
// Tests
// =============================================================================
