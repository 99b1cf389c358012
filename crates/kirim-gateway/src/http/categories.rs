use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use kirim_core::types::Category;

use super::{bad_request, store_error, ApiResult};
use crate::app::AppState;

#[derive(Deserialize)]
pub struct CreateCategory {
    pub name: String,
}

/// GET /api/categories
pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Category>>> {
    state
        .store
        .list_categories()
        .map(Json)
        .map_err(store_error)
}

/// POST /api/categories
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateCategory>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(bad_request("category name must not be empty"));
    }
    state
        .store
        .create_category(name)
        .map(|c| (StatusCode::CREATED, Json(c)))
        .map_err(store_error)
}

/// DELETE /api/categories/{id}
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .store
        .delete_category(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(store_error)
}
