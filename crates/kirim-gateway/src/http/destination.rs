use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

use kirim_core::types::{DestinationConfig, DestinationKind};

use super::{bad_request, not_found, store_error, ApiResult};
use crate::app::AppState;

#[derive(Deserialize)]
pub struct SetDestination {
    pub destination: String,
    #[serde(default = "default_kind")]
    pub kind: DestinationKind,
}

fn default_kind() -> DestinationKind {
    DestinationKind::Single
}

/// GET /api/config — the single active destination.
pub async fn fetch(State(state): State<Arc<AppState>>) -> ApiResult<Json<DestinationConfig>> {
    match state.store.get_destination().map_err(store_error)? {
        Some(config) => Ok(Json(config)),
        None => Err(not_found("no destination configured")),
    }
}

/// PUT /api/config — create or replace the destination.
pub async fn set(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetDestination>,
) -> ApiResult<Json<DestinationConfig>> {
    let destination = body.destination.trim();
    if destination.is_empty() {
        return Err(bad_request("destination must not be empty"));
    }
    state
        .store
        .set_destination(destination, body.kind)
        .map(Json)
        .map_err(store_error)
}
