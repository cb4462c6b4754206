//! Opening images: format detection and the source factory.
//!
//! The dispatcher resolves an `OPEN_FILE` request to an [`ImageSource`]
//! through a [`SourceProvider`]. Container readers are plug-ins chosen by
//! [`detect_format`]; this crate ships the in-memory provider used for
//! synthetic cubes and tests, while on-disk readers register their own
//! provider at server construction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::image::source::ImageSource;

// =============================================================================
// Format detection
// =============================================================================

/// Container formats recognised by the file browser and open path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeFormat {
    Fits,
    Hdf5,
    /// CASA paged image (a directory of tables)
    Paged,
    /// MIRIAD image (a directory with `header` and `image` items)
    Miriad,
    Unknown,
}

impl CubeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CubeFormat::Fits => "FITS",
            CubeFormat::Hdf5 => "HDF5",
            CubeFormat::Paged => "CASA",
            CubeFormat::Miriad => "MIRIAD",
            CubeFormat::Unknown => "unknown",
        }
    }
}

/// Detect the container format of a directory entry.
///
/// Regular files are classified by extension; directories by their
/// characteristic member files.
pub fn detect_format(path: &Path) -> CubeFormat {
    if path.is_dir() {
        if path.join("table.dat").is_file() {
            return CubeFormat::Paged;
        }
        if path.join("header").is_file() && path.join("image").is_file() {
            return CubeFormat::Miriad;
        }
        return CubeFormat::Unknown;
    }

    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("fits") | Some("fit") | Some("fts") => CubeFormat::Fits,
        Some("hdf5") | Some("h5") => CubeFormat::Hdf5,
        _ => CubeFormat::Unknown,
    }
}

// =============================================================================
// SourceProvider Trait
// =============================================================================

/// Factory that turns an `OPEN_FILE` request into an [`ImageSource`].
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Open `file` under `directory` (both relative to the provider's base),
    /// selecting the sub-dataset `hdu` when the container has several.
    async fn open(
        &self,
        directory: &str,
        file: &str,
        hdu: &str,
    ) -> Result<Box<dyn ImageSource>, SourceError>;
}

// =============================================================================
// Directory provider
// =============================================================================

/// Provider rooted at a data folder, delegating to format readers.
///
/// Reader construction is injected per format; formats without a registered
/// reader fail the open with a `FormatError`, which surfaces to the client
/// as `OPEN_FILE_ACK { success: false }`.
pub struct DirectoryProvider {
    base: PathBuf,
}

impl DirectoryProvider {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn resolve(&self, directory: &str, file: &str) -> Result<PathBuf, SourceError> {
        for part in Path::new(directory).components().chain(Path::new(file).components()) {
            if matches!(part, std::path::Component::ParentDir) {
                return Err(SourceError::Format("path may not contain '..'".into()));
            }
        }
        let mut path = self.base.clone();
        if !directory.is_empty() && directory != "/" {
            path.push(directory.trim_start_matches('/'));
        }
        path.push(file);
        Ok(path)
    }
}

#[async_trait]
impl SourceProvider for DirectoryProvider {
    async fn open(
        &self,
        directory: &str,
        file: &str,
        _hdu: &str,
    ) -> Result<Box<dyn ImageSource>, SourceError> {
        let path = self.resolve(directory, file)?;
        if !path.exists() {
            return Err(SourceError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }
        let format = detect_format(&path);
        Err(SourceError::Format(format!(
            "no {} reader is linked into this build",
            format.as_str()
        )))
    }
}

// =============================================================================
// Memory provider
// =============================================================================

type SourceFactory = Arc<dyn Fn() -> Box<dyn ImageSource> + Send + Sync>;

/// Provider serving pre-registered in-memory cubes, keyed by file name.
///
/// Used for synthetic demo cubes and throughout the test suite.
#[derive(Default)]
pub struct MemoryProvider {
    cubes: HashMap<String, SourceFactory>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cube under `name`; the factory runs once per open.
    pub fn insert<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ImageSource> + Send + Sync + 'static,
    {
        self.cubes.insert(name.into(), Arc::new(factory));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cubes.keys().map(|k| k.as_str())
    }
}

#[async_trait]
impl SourceProvider for MemoryProvider {
    async fn open(
        &self,
        _directory: &str,
        file: &str,
        _hdu: &str,
    ) -> Result<Box<dyn ImageSource>, SourceError> {
        match self.cubes.get(file) {
            Some(factory) => Ok(factory()),
            None => Err(SourceError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no cube registered as {file}"),
            ))),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
