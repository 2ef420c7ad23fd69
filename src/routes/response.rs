//! JSON response helpers shared by all routes
//!
//! Success bodies carry `ok: true`; failures are `{ok: false, error}` with the
//! status taken from the error variant.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::{error, warn};

use crate::types::BoardError;

/// Create JSON response
pub fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(data)
        .unwrap_or_else(|_| r#"{"ok":false,"error":"Serialization failed"}"#.to_string());

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

/// Create error response from a domain error
pub fn error_response(err: &BoardError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    if status.is_server_error() {
        error!(status = %status, error = %err, "Request failed");
    } else {
        warn!(status = %status, error = %err, "Request rejected");
    }

    json_response(
        status,
        &serde_json::json!({
            "ok": false,
            "error": err.to_string(),
        }),
    )
}
