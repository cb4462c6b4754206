//! Image access layer.
//!
//! Everything the pipeline knows about pixels comes through here: the
//! [`ImageSource`] trait for random access to an opened cube, the
//! [`SourceProvider`] factory that turns `OPEN_FILE` requests into sources,
//! and the shared [`ImageShape`] / [`PixelBounds`] geometry types.

mod memory;
mod provider;
mod shape;
mod source;

pub use memory::MemorySource;
pub use provider::{detect_format, CubeFormat, DirectoryProvider, MemoryProvider, SourceProvider};
pub use shape::{ImageShape, PixelBounds};
pub use source::{ImageSource, StatsTable, SubData};
