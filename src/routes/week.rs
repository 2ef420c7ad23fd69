//! Current week route
//!
//! `GET /week` returns the current week key and that week's mission
//! selection from the configured catalog.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use super::response::json_response;
use crate::server::AppState;
use crate::week;

/// Handle GET /week
pub fn current_week(state: &AppState) -> Response<Full<Bytes>> {
    let week_key = week::current_week_key();
    let mission_ids =
        week::weekly_selection(&state.mission_catalog, &week_key, state.args.missions_per_week);

    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "ok": true,
            "weekKey": week_key,
            "missionIds": mission_ids,
        }),
    )
}
