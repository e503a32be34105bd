//! HTTP API of the daemon.
//!
//! Browser-facing endpoints for connecting the Amazon Ads account, a status
//! endpoint, and thin Ads API pass-throughs that exercise the token manager.

pub mod handlers;
pub mod server;
pub mod types;

pub use handlers::{ApiState, AppError, DaemonTokenManager};
pub use server::{create_router, start_server, ServerHandle};
