//! Accomplish routes
//!
//! - `POST /accomplish` - claim a mission for a client (idempotent)
//! - `DELETE /accomplish` - retract a claim (idempotent)
//!
//! Body for both: `{ "weekKey": string, "missionId": string, "clientId": string }`

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Deserialize;

use super::response::{error_response, json_response};
use crate::server::AppState;
use crate::types::{BoardError, Result};

/// Request body shared by claim and retract.
///
/// Absent fields default to empty and are rejected by validation; fields of
/// the wrong JSON type fail deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccomplishBody {
    #[serde(default)]
    pub week_key: String,
    #[serde(default)]
    pub mission_id: String,
    #[serde(default)]
    pub client_id: String,
}

impl AccomplishBody {
    /// Parse a raw request body
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| {
            BoardError::InvalidArgument(format!("Missing weekKey/missionId/clientId ({})", e))
        })
    }
}

/// Handle POST /accomplish
pub async fn handle_claim(state: &AppState, body: Bytes) -> Response<Full<Bytes>> {
    let req = match AccomplishBody::parse(&body) {
        Ok(req) => req,
        Err(e) => return error_response(&e),
    };

    match state
        .accomplish
        .claim(&req.week_key, &req.mission_id, &req.client_id)
        .await
    {
        Ok(outcome) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "ok": true, "counted": outcome.counted }),
        ),
        Err(e) => error_response(&e),
    }
}

/// Handle DELETE /accomplish
pub async fn handle_retract(state: &AppState, body: Bytes) -> Response<Full<Bytes>> {
    let req = match AccomplishBody::parse(&body) {
        Ok(req) => req,
        Err(e) => return error_response(&e),
    };

    match state
        .accomplish
        .retract(&req.week_key, &req.mission_id, &req.client_id)
        .await
    {
        Ok(outcome) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "ok": true, "removed": outcome.removed }),
        ),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{body_json, memory_state};

    fn body(json: &str) -> Bytes {
        Bytes::from(json.to_string())
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        assert!(AccomplishBody::parse(br#"{"weekKey":1,"missionId":"m","clientId":"c"}"#).is_err());
        assert!(AccomplishBody::parse(b"not json").is_err());
        assert!(AccomplishBody::parse(b"").is_err());
    }

    #[test]
    fn test_parse_defaults_missing_fields() {
        let req = AccomplishBody::parse(br#"{"missionId":"m1"}"#).unwrap();
        assert_eq!(req.mission_id, "m1");
        assert!(req.week_key.is_empty());
        assert!(req.client_id.is_empty());
    }

    #[tokio::test]
    async fn test_claim_then_duplicate() {
        let (_store, state) = memory_state();
        let payload = r#"{"weekKey":"2024-01-01","missionId":"m1","clientId":"A"}"#;

        let first = handle_claim(&state, body(payload)).await;
        assert_eq!(first.status(), StatusCode::OK);
        let json = body_json(first).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["counted"], true);

        let second = body_json(handle_claim(&state, body(payload)).await).await;
        assert_eq!(second["counted"], false);
    }

    #[tokio::test]
    async fn test_missing_field_is_bad_request() {
        let (store, state) = memory_state();
        let response =
            handle_claim(&state, body(r#"{"weekKey":"2024-01-01","missionId":"m1"}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["ok"], false);
        assert_eq!(store.op_count(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_is_server_error() {
        let (store, state) = memory_state();
        store.set_available(false);
        let response = handle_retract(
            &state,
            body(r#"{"weekKey":"2024-01-01","missionId":"m1","clientId":"A"}"#),
        )
        .await;
        assert!(response.status().is_server_error());
        assert_eq!(body_json(response).await["ok"], false);
    }

    #[tokio::test]
    async fn test_retract_reports_removed() {
        let (_store, state) = memory_state();
        let payload = r#"{"weekKey":"2024-01-01","missionId":"m1","clientId":"A"}"#;

        handle_claim(&state, body(payload)).await;
        let json = body_json(handle_retract(&state, body(payload)).await).await;
        assert_eq!(json["removed"], true);

        let json = body_json(handle_retract(&state, body(payload)).await).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["removed"], false);
    }

    #[tokio::test]
    async fn test_counter_failure_after_event_write_is_503() {
        let (store, state) = memory_state();
        let payload = r#"{"weekKey":"2024-01-01","missionId":"m1","clientId":"A"}"#;
        store.set_counter_writes_failing(true);

        let response = handle_claim(&state, body(payload)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["ok"], false);

        store.set_counter_writes_failing(false);
        let retry = body_json(handle_claim(&state, body(payload)).await).await;
        assert_eq!(retry["ok"], true);
        assert_eq!(retry["counted"], false);
    }
}
