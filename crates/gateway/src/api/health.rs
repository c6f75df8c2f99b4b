//! Liveness/readiness probes (§6). `/healthz` is always 200 once the
//! process is up; `/readyz` additionally checks the store is reachable.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::state::AppState;

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    // A harmless read: `not-found` (or a hit) means the store answered,
    // which is all readiness needs to know.
    match state.store.get_response("__readyz_probe__") {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "status": "ready" }))),
        Err(e) if e.kind.as_str() == "not-found" => (StatusCode::OK, Json(serde_json::json!({ "status": "ready" }))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not-ready", "error": e.message })),
        ),
    }
}
