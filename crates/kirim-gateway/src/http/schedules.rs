use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use kirim_core::types::{
    parse_days_of_month, parse_days_of_week, parse_time_of_day, Schedule, ScheduleKind,
    ScheduledJob,
};
use kirim_scheduler::generator;
use kirim_store::{NewSchedule, UpdateSchedule};

use super::{bad_request, not_found, store_error, ApiResult};
use crate::app::AppState;

#[derive(Deserialize)]
pub struct ScheduleRequest {
    pub name: Option<String>,
    pub post_id: Option<String>,
    pub kind: ScheduleKind,
    pub time_of_day: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub days_of_week: Option<String>,
    pub days_of_month: Option<String>,
    #[serde(default = "super::bool_true")]
    pub is_active: bool,
}

#[derive(Serialize)]
pub struct ScheduleDetail {
    #[serde(flatten)]
    pub schedule: Schedule,
    pub jobs: Vec<ScheduledJob>,
}

/// Reject malformed recurrence rules before they reach the store — the
/// generator would only surface them later as per-tick config errors.
fn validate_rule(
    kind: ScheduleKind,
    time_of_day: &str,
    days_of_week: Option<&str>,
    days_of_month: Option<&str>,
) -> Result<(), String> {
    parse_time_of_day(time_of_day)?;
    match kind {
        ScheduleKind::Weekly => {
            let csv = days_of_week.ok_or("weekly schedules need days_of_week")?;
            parse_days_of_week(csv)?;
        }
        ScheduleKind::Monthly => {
            let csv = days_of_month.ok_or("monthly schedules need days_of_month")?;
            parse_days_of_month(csv)?;
        }
        ScheduleKind::Once | ScheduleKind::Daily => {}
    }
    Ok(())
}

/// GET /api/schedules
pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Schedule>>> {
    state.store.list_schedules().map(Json).map_err(store_error)
}

/// POST /api/schedules — create and materialize the first horizon batch.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScheduleRequest>,
) -> ApiResult<(StatusCode, Json<Schedule>)> {
    let post_id = body
        .post_id
        .ok_or_else(|| bad_request("post_id is required"))?;
    validate_rule(
        body.kind,
        &body.time_of_day,
        body.days_of_week.as_deref(),
        body.days_of_month.as_deref(),
    )
    .map_err(bad_request)?;

    if state.store.get_post(&post_id).map_err(store_error)?.is_none() {
        return Err(bad_request(format!("post not found: {post_id}")));
    }

    let schedule = state
        .store
        .create_schedule(NewSchedule {
            name: body.name,
            post_id,
            kind: body.kind,
            time_of_day: body.time_of_day,
            start_date: body.start_date,
            end_date: body.end_date,
            days_of_week: body.days_of_week,
            days_of_month: body.days_of_month,
            is_active: body.is_active,
        })
        .map_err(store_error)?;

    // Materialize immediately rather than waiting for the next tick.
    if schedule.is_active {
        let now = Utc::now();
        match generator::ensure_jobs(
            &state.store,
            &schedule,
            &now,
            state.config.scheduler.horizon_days,
            state.tz,
        ) {
            Ok(created) => info!(schedule_id = %schedule.id, created, "initial jobs materialized"),
            Err(e) => warn!(schedule_id = %schedule.id, error = %e, "initial job generation failed"),
        }
    }

    Ok((StatusCode::CREATED, Json(schedule)))
}

/// GET /api/schedules/{id} — the schedule plus its full job audit trail.
pub async fn fetch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ScheduleDetail>> {
    let schedule = match state.store.get_schedule(&id).map_err(store_error)? {
        Some(s) => s,
        None => return Err(not_found(format!("schedule not found: {id}"))),
    };
    let jobs = state.store.jobs_for_schedule(&id).map_err(store_error)?;
    Ok(Json(ScheduleDetail { schedule, jobs }))
}

/// PUT /api/schedules/{id} — full replace.
///
/// The schedule row, the cancellation of its future PENDING jobs, and the
/// regenerated job set all land in one store transaction, so no reader
/// observes a half-updated set.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ScheduleRequest>,
) -> ApiResult<Json<Schedule>> {
    let existing = match state.store.get_schedule(&id).map_err(store_error)? {
        Some(s) => s,
        None => return Err(not_found(format!("schedule not found: {id}"))),
    };
    validate_rule(
        body.kind,
        &body.time_of_day,
        body.days_of_week.as_deref(),
        body.days_of_month.as_deref(),
    )
    .map_err(bad_request)?;

    let candidate = Schedule {
        name: body.name.clone(),
        kind: body.kind,
        time_of_day: body.time_of_day.clone(),
        start_date: body.start_date,
        end_date: body.end_date,
        days_of_week: body.days_of_week.clone(),
        days_of_month: body.days_of_month.clone(),
        is_active: body.is_active,
        ..existing
    };

    let now = Utc::now();
    let regenerated = if candidate.is_active {
        generator::regenerate_jobs(
            &candidate,
            &now,
            state.config.scheduler.horizon_days,
            state.tz,
        )
        .map_err(|e| bad_request(e.to_string()))?
    } else {
        Vec::new()
    };

    state
        .store
        .apply_schedule_update(
            &id,
            UpdateSchedule {
                name: Some(body.name),
                kind: Some(body.kind),
                time_of_day: Some(body.time_of_day),
                start_date: Some(body.start_date),
                end_date: Some(body.end_date),
                days_of_week: Some(body.days_of_week),
                days_of_month: Some(body.days_of_month),
                is_active: Some(body.is_active),
            },
            &now,
            &regenerated,
        )
        .map(Json)
        .map_err(store_error)
}

/// DELETE /api/schedules/{id} — removes the rule, cancels its future
/// PENDING jobs, keeps past jobs for the audit trail.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .store
        .delete_schedule(&id, &Utc::now())
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(store_error)
}
