use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use kirim_core::types::{MediaType, Post};
use kirim_store::{NewPost, PostFilter, UpdatePost};

use super::{bad_request, not_found, store_error, ApiResult};
use crate::app::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    pub category_id: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct CreatePost {
    pub category_id: Option<String>,
    pub title: Option<String>,
    pub caption: String,
    pub media_type: MediaType,
    #[serde(default)]
    pub media_url: String,
    #[serde(default = "super::bool_true")]
    pub is_active: bool,
}

#[derive(Deserialize, Default)]
pub struct PatchPost {
    pub category_id: Option<Option<String>>,
    pub title: Option<Option<String>>,
    pub caption: Option<String>,
    pub media_type: Option<MediaType>,
    pub media_url: Option<String>,
    pub is_active: Option<bool>,
}

fn validate_media(media_type: MediaType, media_url: &str) -> Result<(), String> {
    if media_type != MediaType::Text && media_url.trim().is_empty() {
        return Err(format!("{media_type} posts need a media_url"));
    }
    Ok(())
}

/// GET /api/posts
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Post>>> {
    state
        .store
        .list_posts(&PostFilter {
            category_id: query.category_id,
            is_active: query.is_active,
        })
        .map(Json)
        .map_err(store_error)
}

/// POST /api/posts
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreatePost>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    if body.caption.trim().is_empty() && body.media_type == MediaType::Text {
        return Err(bad_request("text posts need a caption"));
    }
    validate_media(body.media_type, &body.media_url).map_err(bad_request)?;

    state
        .store
        .create_post(NewPost {
            category_id: body.category_id,
            title: body.title,
            caption: body.caption,
            media_type: body.media_type,
            media_url: body.media_url,
            is_active: body.is_active,
        })
        .map(|p| (StatusCode::CREATED, Json(p)))
        .map_err(store_error)
}

/// GET /api/posts/{id}
pub async fn fetch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Post>> {
    match state.store.get_post(&id).map_err(store_error)? {
        Some(post) => Ok(Json(post)),
        None => Err(not_found(format!("post not found: {id}"))),
    }
}

/// PUT /api/posts/{id}
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PatchPost>,
) -> ApiResult<Json<Post>> {
    let existing = match state.store.get_post(&id).map_err(store_error)? {
        Some(post) => post,
        None => return Err(not_found(format!("post not found: {id}"))),
    };

    // Validate the merged result before touching the row.
    let final_type = body.media_type.unwrap_or(existing.media_type);
    let final_url = body.media_url.as_deref().unwrap_or(&existing.media_url);
    validate_media(final_type, final_url).map_err(bad_request)?;

    state
        .store
        .update_post(
            &id,
            UpdatePost {
                category_id: body.category_id,
                title: body.title,
                caption: body.caption,
                media_type: body.media_type,
                media_url: body.media_url,
                is_active: body.is_active,
            },
        )
        .map(Json)
        .map_err(store_error)
}

/// DELETE /api/posts/{id}
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .store
        .delete_post(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(store_error)
}
