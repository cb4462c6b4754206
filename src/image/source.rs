//! ImageSource trait for format-agnostic cube access.
//!
//! This module defines the `ImageSource` trait, the single interface through
//! which the view pipeline reads pixel data. Container-specific readers
//! (FITS, HDF5, MIRIAD, paged) implement it behind a [`SourceProvider`];
//! the pipeline never learns which format backs a frame.
//!
//! [`SourceProvider`]: crate::image::SourceProvider

use async_trait::async_trait;
use ndarray::Array2;

use crate::error::SourceError;
use crate::image::shape::{ImageShape, PixelBounds};

// =============================================================================
// Sub-dataset kinds
// =============================================================================

/// Optional sub-datasets a container may carry next to the primary cube.
///
/// Callers test availability with [`ImageSource::has_sub`] before asking for
/// the data; absence is never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubData {
    /// The XY(ZW) pixel cube itself
    PrimaryCube,

    /// Channel-first copy of a 3D cube, fast for spectral reads
    SwizzledZyx,

    /// Channel-first copy of a 4D cube
    SwizzledZyxw,

    /// Per-plane minimum table
    StatsMin,

    /// Per-plane maximum table
    StatsMax,

    /// Per-plane mean table
    StatsMean,

    /// Per-plane NaN-count table
    StatsNanCount,

    /// Per-plane histogram bins
    StatsHistogram,

    /// Per-plane percentile values
    StatsPercentiles,

    /// Percentile ranks shared by all planes
    PercentileRanks,
}

/// A raw statistics table read from a container.
///
/// `values` is the flattened table; `dims` gives its shape with the slowest
/// axis first, e.g. `[stokes, depth, num_bins]` for 4D histogram tables.
/// The consumer validates `dims` against the image shape, mirroring how
/// containers store stats for 2D, 3D and 4D cubes differently.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsTable {
    pub dims: Vec<usize>,
    pub values: Vec<f32>,
}

// =============================================================================
// ImageSource Trait
// =============================================================================

/// Random-access reader for one opened image cube.
///
/// Exactly one `Frame` owns each source. `read_slice` must be callable
/// concurrently for distinct (channel, stokes) pairs; implementations
/// synchronize internally.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Shape of the cube, fixed at open time.
    fn shape(&self) -> &ImageShape;

    /// Whether the container carries the given sub-dataset. Constant time.
    fn has_sub(&self, kind: SubData) -> bool;

    /// Read one rectangular window of a (channel, stokes) plane.
    ///
    /// Returns a dense `(bounds.height, bounds.width)` matrix in row-major
    /// order, rows running `y_min..y_max` top to bottom.
    async fn read_slice(
        &self,
        channel: usize,
        stokes: usize,
        bounds: &PixelBounds,
    ) -> Result<Array2<f32>, SourceError>;

    /// Read a pre-computed statistics table.
    ///
    /// Callers must first test `has_sub` for the kind; asking for an absent
    /// table returns `MissingStats`.
    fn read_stats(&self, kind: SubData) -> Result<StatsTable, SourceError>;

    /// Restoring-beam area in pixels, when the header carries one.
    ///
    /// Used to convert spectral sums to flux; `None` leaves flux equal
    /// to sum.
    fn beam_area(&self) -> Option<f64> {
        None
    }
}
