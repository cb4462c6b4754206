//! Server layer: connection acceptance, access policy and file browsing.

pub mod browser;
mod policy;
mod ws;

pub use policy::{AccessPolicy, AllowAll, PermissionsMap};
pub use ws::{create_router, AppState, DEFAULT_MAX_MISSED_PINGS, DEFAULT_PING_INTERVAL};
