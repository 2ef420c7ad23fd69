//! Mission totals route
//!
//! `POST /mission-totals` with `{ "missionIds": [...], "weekKey"?: string }`.
//! Responds `{ ok: true, totals: { id: count } }`. A missing or empty id list
//! yields `{}` rather than an error so the board can ask before it knows its
//! missions. Without `weekKey` the current UTC week is used.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::Value;

use super::response::{error_response, json_response};
use crate::server::AppState;
use crate::week;

/// Parsed totals request
#[derive(Debug, Default, PartialEq)]
pub struct TotalsRequest {
    pub week_key: Option<String>,
    pub mission_ids: Vec<String>,
}

impl TotalsRequest {
    /// Lenient parse: unreadable bodies become an empty request.
    ///
    /// Every value in `missionIds` is stringified the way the board's own
    /// front-end would (`null` becomes `"null"`).
    pub fn parse(body: &[u8]) -> Self {
        let value: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(_) => return Self::default(),
        };

        let week_key = value
            .get("weekKey")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let mission_ids = value
            .get("missionIds")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter().map(display_id).collect()
            })
            .unwrap_or_default();

        Self {
            week_key,
            mission_ids,
        }
    }
}

/// Loose string form of a JSON value: arrays join their elements with
/// commas (null elements empty), objects collapse to `[object Object]`
fn display_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => display_id(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Handle POST /mission-totals
pub async fn handle_mission_totals(state: &AppState, body: Bytes) -> Response<Full<Bytes>> {
    let req = TotalsRequest::parse(&body);
    let week_key = req.week_key.unwrap_or_else(week::current_week_key);

    match state.totals.get_totals(&week_key, &req.mission_ids).await {
        Ok(totals) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "ok": true, "weekKey": week_key, "totals": totals }),
        ),
        Err(e) => error_response(&e),
    }
}
