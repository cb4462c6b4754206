//! Parallel reduction kernels.
//!
//! Min/max, histogram, mean-pool downsampling and per-channel statistics,
//! all NaN-aware: NaN is never compared or accumulated, and min/max are NaN
//! only when every element is. Each kernel tiles its input into row chunks
//! for rayon, and its single-threaded result is observationally identical.

mod downsample;
mod histogram;
mod minmax;
mod spectral;

pub use downsample::{mean_pool, nearest};
pub use histogram::{auto_bin_count, histogram};
pub use minmax::{min_max, nan_count};
pub use spectral::{channel_stats, ChannelStats};
