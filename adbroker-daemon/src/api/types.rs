//! Request and response types for the daemon HTTP API.

use serde::{Deserialize, Serialize};

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of `GET /` when no front end is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub health: String,
    pub login: String,
}

/// Plain status body, used by `/health` and a completed callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Query parameters of the authorization callback.
///
/// The provider sends either `code` and `state`, or `error` with an optional
/// `error_description`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Query parameters of `GET /ads/campaigns`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignsQuery {
    pub profile_id: Option<String>,
}
