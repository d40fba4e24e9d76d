//! Liveness/readiness — ambient operational surface every service in the
//! corpus this workspace is grounded on exposes alongside its business
//! routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    let voice_ok = state.voice.worker_count() > 0;

    if db_ok && voice_ok {
        (StatusCode::OK, Json(json!({ "database": true, "voice_workers": true })))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "database": db_ok, "voice_workers": voice_ok })))
    }
}
