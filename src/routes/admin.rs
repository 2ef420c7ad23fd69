//! Admin routes
//!
//! `POST /admin/reconcile` with optional `{ "weekKey": string }` rewrites
//! drifted counters for that week (default: current week). Requires the
//! `X-Admin-Key` header to match `ADMIN_KEY`; without a configured key the
//! route does not exist.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::Value;

use super::response::{error_response, json_response};
use crate::server::AppState;
use crate::types::BoardError;
use crate::week;

/// Header carrying the admin key
pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

/// Check the presented key against configuration
fn authorize(state: &AppState, presented: Option<&str>) -> Result<(), BoardError> {
    let expected = match state.args.admin_key.as_deref() {
        Some(key) if !key.is_empty() => key,
        _ => return Err(BoardError::NotFound("/admin/reconcile".into())),
    };

    match presented {
        Some(key) if key == expected => Ok(()),
        Some(_) => Err(BoardError::Unauthorized("Invalid admin key".into())),
        None => Err(BoardError::Unauthorized(format!("Missing {} header", ADMIN_KEY_HEADER))),
    }
}

/// Handle POST /admin/reconcile
pub async fn handle_reconcile(
    state: &AppState,
    admin_key: Option<&str>,
    body: Bytes,
) -> Response<Full<Bytes>> {
    if let Err(e) = authorize(state, admin_key) {
        return error_response(&e);
    }

    let week_key = serde_json::from_slice::<Value>(&body)
        .ok()
        .as_ref()
        .and_then(|v| v.get("weekKey"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(week::current_week_key);

    match state.reconcile.reconcile(&week_key).await {
        Ok(report) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "ok": true, "report": report }),
        ),
        Err(e) => error_response(&e),
    }
}
