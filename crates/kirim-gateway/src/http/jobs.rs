use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

use kirim_core::types::{JobStatus, ScheduledJob};
use kirim_store::NewJob;

use super::{bad_request, store_error, ApiResult};
use crate::app::AppState;

const DEFAULT_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<JobStatus>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct SendNowRequest {
    pub post_id: String,
}

/// GET /api/jobs
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ScheduledJob>>> {
    state
        .store
        .list_jobs(query.status, query.limit.unwrap_or(DEFAULT_LIMIT))
        .map(Json)
        .map_err(store_error)
}

/// POST /api/jobs/send-now — queue an immediate one-off delivery.
///
/// Creates a PENDING job with no schedule, due right now, then nudges the
/// tick driver so the send does not wait for the next poll interval.
pub async fn send_now(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendNowRequest>,
) -> ApiResult<(StatusCode, Json<ScheduledJob>)> {
    if state
        .store
        .get_post(&body.post_id)
        .map_err(store_error)?
        .is_none()
    {
        return Err(bad_request(format!("post not found: {}", body.post_id)));
    }

    let job = state
        .store
        .insert_job(NewJob {
            schedule_id: None,
            post_id: body.post_id,
            scheduled_at: Utc::now(),
        })
        .map_err(store_error)?;
    info!(job_id = %job.id, "send-now job queued");

    // Fire-and-forget: an overlapping tick is skipped, not queued, so this
    // is at worst a no-op and the regular interval picks the job up.
    let driver = Arc::clone(&state.driver);
    tokio::spawn(async move {
        if let Err(e) = driver.run_once().await {
            error!("send-now tick failed: {e}");
        }
    });

    Ok((StatusCode::CREATED, Json(job)))
}
