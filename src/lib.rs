//! Cube Streamer - a raster streaming backend for astronomical image cubes.
//!
//! This library implements the per-session view pipeline for 2D-4D image
//! cubes: slicing a plane out of an opened cube, downsampling it, running
//! parallel NaN-aware reductions, and streaming lossy-compressed rasters
//! with their matching histograms over a binary websocket protocol.

pub mod comp;
pub mod config;
pub mod error;
pub mod frame;
pub mod image;
pub mod proto;
pub mod reduce;
pub mod region;
pub mod server;
pub mod session;

// Re-export commonly used types
pub use comp::{compress_raster, PriorityQueue, RasterBands, WorkerPool, MAX_SUBSETS};
pub use config::Config;
pub use error::{CodecError, FrameError, SessionError, SourceError};
pub use frame::Frame;
pub use image::{
    detect_format, CubeFormat, DirectoryProvider, ImageShape, ImageSource, MemoryProvider,
    MemorySource, PixelBounds, SourceProvider, StatsTable, SubData,
};
pub use region::{Region, RegionProfiler, RegionStats, CURSOR_REGION_ID, WHOLE_IMAGE_REGION_ID};
pub use server::{create_router, AccessPolicy, AllowAll, AppState, PermissionsMap};
pub use session::{CompressionSettings, Session};
