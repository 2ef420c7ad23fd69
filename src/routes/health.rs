//! Health check endpoint
//!
//! `GET /health` pings the persistence layer. 200 `{ok: true, ...}` when it
//! answers, 503 `{ok: false, error}` when it does not.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::response::{error_response, json_response};
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    /// Active storage backend
    pub store: &'static str,
    pub node_id: String,
    pub version: &'static str,
    pub uptime: u64,
    pub timestamp: String,
}

/// Handle GET /health
pub async fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    if let Err(e) = state.stores.ping().await {
        return error_response(&e);
    }

    json_response(
        StatusCode::OK,
        &HealthResponse {
            ok: true,
            store: state.stores.backend_name(),
            node_id: state.args.node_id.to_string(),
            version: env!("CARGO_PKG_VERSION"),
            uptime: state.started_at.elapsed().as_secs(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        },
    )
}
