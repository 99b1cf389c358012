pub mod categories;
pub mod destination;
pub mod health;
pub mod jobs;
pub mod posts;
pub mod scheduler;
pub mod schedules;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use kirim_store::StoreError;

/// Uniform error body for every API route.
#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub fn bad_request(msg: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError { error: msg.into() }),
    )
}

pub fn not_found(msg: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (StatusCode::NOT_FOUND, Json(ApiError { error: msg.into() }))
}

pub fn internal(msg: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError { error: msg.into() }),
    )
}

pub(crate) fn bool_true() -> bool {
    true
}

/// Map storage errors onto HTTP: missing rows are 404, the rest 500.
pub fn store_error(e: StoreError) -> (StatusCode, Json<ApiError>) {
    match e {
        StoreError::NotFound { .. } => not_found(e.to_string()),
        other => internal(other.to_string()),
    }
}
