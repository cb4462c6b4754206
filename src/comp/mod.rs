//! Compression subsystem.
//!
//! The process-wide [`WorkerPool`] drains a priority queue of CPU-bound
//! jobs; [`compress_raster`] fans a raster's row bands across it and
//! reassembles the blocks and NaN maps in band order.

pub mod codec;
mod pool;
mod queue;
mod raster;

pub use codec::{
    clamp_precision, is_valid_precision, DEFAULT_PRECISION, MAX_PRECISION, MIN_PRECISION,
};
pub use pool::WorkerPool;
pub use queue::PriorityQueue;
pub use raster::{band_rows, compress_raster, RasterBands, MAX_SUBSETS};
