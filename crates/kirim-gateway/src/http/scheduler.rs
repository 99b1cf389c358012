//! On-demand scheduler trigger — POST /api/scheduler/run
//!
//! The same entry point the interval loop uses, exposed for external cron
//! services and manual operator nudges. Auth: `Authorization: Bearer
//! <gateway.cron_secret>`.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use kirim_scheduler::TickSummary;

use super::{internal, ApiError, ApiResult};
use crate::app::AppState;

fn check_auth(state: &AppState, headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {}", state.config.gateway.cron_secret);
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|got| got == expected)
}

/// POST /api/scheduler/run — run one generate-then-dispatch tick.
pub async fn run_once(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<TickSummary>> {
    if !check_auth(&state, &headers) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiError {
                error: "Unauthorized. Set 'Authorization: Bearer <cron-secret>' header."
                    .to_string(),
            }),
        ));
    }

    state
        .driver
        .run_once()
        .await
        .map(Json)
        .map_err(|e| internal(e.to_string()))
}
