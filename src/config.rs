//! Configuration management for Cube Streamer.
//!
//! Settings come from command-line arguments with `CUBE_`-prefixed
//! environment fallbacks and sensible defaults, so the server runs with no
//! arguments at all in development.
//!
//! # Environment Variables
//!
//! - `CUBE_HOST` - Server bind address (default: 0.0.0.0)
//! - `CUBE_PORT` - Server port (default: 3002)
//! - `CUBE_FOLDER` - Base folder for image files (default: .)
//! - `CUBE_PERMISSIONS` - Permissions file enabling access control
//! - `CUBE_THREADS` - Worker pool size (default: one per core)
//! - `CUBE_NUM_SUBSETS` - Default compression bands per raster (default: 4)
//! - `CUBE_PING_INTERVAL` - Liveness ping interval in seconds (default: 5)
//! - `CUBE_MAX_MISSED_PINGS` - Unanswered pings before disconnect (default: 3)

use std::path::PathBuf;

use clap::Parser;

use crate::comp::MAX_SUBSETS;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3002;

/// Default number of compression bands per raster.
pub const DEFAULT_NUM_SUBSETS: usize = 4;

/// Default liveness ping interval in seconds.
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 5;

/// Default number of unanswered pings tolerated.
pub const DEFAULT_MAX_MISSED_PINGS: u32 = 3;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Cube Streamer - a raster streaming backend for astronomical image cubes.
///
/// Serves compressed raster tiles, histograms and profiles of 2D-4D image
/// cubes over a binary websocket protocol.
#[derive(Parser, Debug, Clone)]
#[command(name = "cube-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "CUBE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "CUBE_PORT")]
    pub port: u16,

    /// Base folder containing the image files.
    #[arg(long, default_value = ".", env = "CUBE_FOLDER")]
    pub folder: PathBuf,

    /// Permissions file; when given, directory access is enforced.
    #[arg(long, env = "CUBE_PERMISSIONS")]
    pub permissions: Option<PathBuf>,

    /// Worker pool thread count (0 = one per core).
    #[arg(long, default_value_t = 0, env = "CUBE_THREADS")]
    pub threads: usize,

    /// Default number of compression bands per raster (1-8).
    #[arg(long, default_value_t = DEFAULT_NUM_SUBSETS, env = "CUBE_NUM_SUBSETS")]
    pub num_subsets: usize,

    /// Liveness ping interval in seconds.
    #[arg(long, default_value_t = DEFAULT_PING_INTERVAL_SECS, env = "CUBE_PING_INTERVAL")]
    pub ping_interval: u64,

    /// Unanswered pings tolerated before the connection is closed.
    #[arg(long, default_value_t = DEFAULT_MAX_MISSED_PINGS, env = "CUBE_MAX_MISSED_PINGS")]
    pub max_missed_pings: u32,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !self.folder.exists() {
            return Err(format!(
                "data folder {} does not exist",
                self.folder.display()
            ));
        }

        if self.num_subsets == 0 || self.num_subsets > MAX_SUBSETS {
            return Err(format!("num_subsets must be between 1 and {MAX_SUBSETS}"));
        }

        if self.ping_interval == 0 {
            return Err("ping_interval must be at least 1 second".to_string());
        }

        if self.threads > 1024 {
            return Err("threads must be at most 1024".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Worker pool size, resolving 0 to the machine's parallelism.
    pub fn worker_threads(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
