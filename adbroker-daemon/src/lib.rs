//! adbroker Daemon Library
//!
//! This library exposes the daemon's API and configuration for testing
//! and for the `adbroker` CLI.

pub mod api;
pub mod config;

pub use api::{create_router, start_server, ApiState, ServerHandle};
pub use config::{load_config, DaemonConfig};
