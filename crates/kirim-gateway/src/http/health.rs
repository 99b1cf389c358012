use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — liveness probe, returns channel + store state.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let store_ok = state.store.list_jobs(None, 1).is_ok();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "channel": state.messenger.status(),
        "store": if store_ok { "ok" } else { "error" },
        "timezone": state.tz.name(),
    }))
}
