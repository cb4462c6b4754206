//! Regions of an image plane and their derived products.

mod geometry;
mod profiler;
#[allow(clippy::module_inception)]
mod region;
mod stats;

pub use geometry::RegionGeometry;
pub use profiler::{
    profile_along, ProfileAxis, RegionProfiler, SpatialRequest, SpectralRequest,
};
pub use region::{Region, CURSOR_REGION_ID, WHOLE_IMAGE_REGION_ID};
pub use stats::{compute_histogram, RegionStats, ALL_CHANNELS, AUTO_BINS, CURRENT_CHANNEL};
