//! API response types not shared with the client
//!
//! The `/chat` request and response bodies live in [`crate::model`] because
//! the terminal client speaks them too.

use serde::Serialize;

/// Body of `GET /health`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_configured: bool,
}
