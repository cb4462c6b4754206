//! Cube Streamer - a raster streaming backend for astronomical image cubes.
//!
//! This binary starts the websocket server and wires all components.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cube_streamer::{
    comp::WorkerPool,
    config::Config,
    image::DirectoryProvider,
    server::{create_router, AccessPolicy, AllowAll, AppState, PermissionsMap},
};

#[tokio::main]
async fn main() {
    // Parse configuration from CLI and environment
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("Starting Cube Streamer");
    info!("  Data folder: {}", config.folder.display());
    info!("  Worker threads: {}", config.worker_threads());
    info!("  Permissions enforced: {}", config.permissions.is_some());

    // Build the access policy
    let policy: Arc<dyn AccessPolicy> = match &config.permissions {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => Arc::new(PermissionsMap::parse(&text)),
            Err(e) => {
                error!("Cannot read permissions file {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Arc::new(AllowAll),
    };

    // Create the source provider and the process-wide worker pool
    let provider = Arc::new(DirectoryProvider::new(config.folder.clone()));
    let pool = Arc::new(WorkerPool::new(config.worker_threads()));

    // Build the router
    let state = AppState {
        provider,
        policy,
        pool,
        base_folder: config.folder.clone(),
        ping_interval: Duration::from_secs(config.ping_interval),
        max_missed_pings: config.max_missed_pings,
    };
    let router = create_router(state);

    // Bind and serve
    let addr = config.bind_address();
    info!("Listening on ws://{}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "cube_streamer=debug"
    } else {
        "cube_streamer=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
