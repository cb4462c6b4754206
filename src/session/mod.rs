//! Session layer: one dispatcher per connection.

#[allow(clippy::module_inception)]
mod session;

pub use session::{CompressionSettings, Session};
