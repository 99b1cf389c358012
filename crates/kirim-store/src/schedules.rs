use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use tracing::{info, instrument};
use uuid::Uuid;

use kirim_core::types::{Schedule, ScheduleKind};

use crate::db::conv_err;
use crate::error::{Result, StoreError};
use crate::jobs::{cancel_future_pending_in, insert_jobs_in, NewJob};
use crate::Store;

/// Input for [`Store::create_schedule`].
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub name: Option<String>,
    pub post_id: String,
    pub kind: ScheduleKind,
    pub time_of_day: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub days_of_week: Option<String>,
    pub days_of_month: Option<String>,
    pub is_active: bool,
}

/// Partial update for [`Store::apply_schedule_update`]. `None` keeps the
/// stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateSchedule {
    pub name: Option<Option<String>>,
    pub kind: Option<ScheduleKind>,
    pub time_of_day: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
    pub days_of_week: Option<Option<String>>,
    pub days_of_month: Option<Option<String>>,
    pub is_active: Option<bool>,
}

const SCHEDULE_COLUMNS: &str = "id, name, post_id, kind, time_of_day, start_date, end_date, \
                                days_of_week, days_of_month, is_active, created_at, updated_at";

const DATE_FMT: &str = "%Y-%m-%d";

fn row_to_schedule(row: &Row) -> rusqlite::Result<Schedule> {
    let kind: String = row.get(3)?;
    let start_date: String = row.get(5)?;
    let end_date: Option<String> = row.get(6)?;
    Ok(Schedule {
        id: row.get(0)?,
        name: row.get(1)?,
        post_id: row.get(2)?,
        kind: kind.parse().map_err(|e| conv_err(3, e))?,
        time_of_day: row.get(4)?,
        start_date: NaiveDate::parse_from_str(&start_date, DATE_FMT)
            .map_err(|e| conv_err(5, e.to_string()))?,
        end_date: end_date
            .map(|s| NaiveDate::parse_from_str(&s, DATE_FMT).map_err(|e| conv_err(6, e.to_string())))
            .transpose()?,
        days_of_week: row.get(7)?,
        days_of_month: row.get(8)?,
        is_active: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl Store {
    pub fn create_schedule(&self, data: NewSchedule) -> Result<Schedule> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO schedules
             (id, name, post_id, kind, time_of_day, start_date, end_date,
              days_of_week, days_of_month, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            rusqlite::params![
                id,
                data.name,
                data.post_id,
                data.kind.to_string(),
                data.time_of_day,
                data.start_date.format(DATE_FMT).to_string(),
                data.end_date.map(|d| d.format(DATE_FMT).to_string()),
                data.days_of_week,
                data.days_of_month,
                data.is_active,
                now
            ],
        )?;
        info!(schedule_id = %id, kind = %data.kind, "schedule created");
        Ok(Schedule {
            id,
            name: data.name,
            post_id: data.post_id,
            kind: data.kind,
            time_of_day: data.time_of_day,
            start_date: data.start_date,
            end_date: data.end_date,
            days_of_week: data.days_of_week,
            days_of_month: data.days_of_month,
            is_active: data.is_active,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn get_schedule(&self, id: &str) -> Result<Option<Schedule>> {
        let conn = self.conn();
        match conn.query_row(
            &format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?1"),
            [id],
            row_to_schedule,
        ) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    pub fn list_schedules(&self) -> Result<Vec<Schedule>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules ORDER BY created_at"
        ))?;
        let rows = stmt.query_map([], row_to_schedule)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Schedules the generator should materialize jobs for.
    pub fn active_schedules(&self) -> Result<Vec<Schedule>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE is_active = 1 ORDER BY created_at"
        ))?;
        let rows = stmt.query_map([], row_to_schedule)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Apply an edit and swap the schedule's future job set, atomically.
    ///
    /// In one transaction: the schedule row is updated, its future PENDING
    /// jobs (scheduled_at >= `cancel_from`) become CANCELLED, and
    /// `regenerated` is bulk-inserted with skip-existing semantics. A reader
    /// never observes both the old future set and the new one as
    /// non-cancelled.
    #[instrument(skip(self, update, regenerated), fields(schedule_id = %id))]
    pub fn apply_schedule_update(
        &self,
        id: &str,
        update: UpdateSchedule,
        cancel_from: &DateTime<Utc>,
        regenerated: &[NewJob],
    ) -> Result<Schedule> {
        let existing = self.get_schedule(id)?.ok_or_else(|| StoreError::NotFound {
            what: "schedule",
            id: id.to_string(),
        })?;

        let merged = Schedule {
            name: update.name.unwrap_or(existing.name),
            kind: update.kind.unwrap_or(existing.kind),
            time_of_day: update.time_of_day.unwrap_or(existing.time_of_day),
            start_date: update.start_date.unwrap_or(existing.start_date),
            end_date: update.end_date.unwrap_or(existing.end_date),
            days_of_week: update.days_of_week.unwrap_or(existing.days_of_week),
            days_of_month: update.days_of_month.unwrap_or(existing.days_of_month),
            is_active: update.is_active.unwrap_or(existing.is_active),
            updated_at: Utc::now().to_rfc3339(),
            ..existing
        };

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE schedules
             SET name = ?1, kind = ?2, time_of_day = ?3, start_date = ?4,
                 end_date = ?5, days_of_week = ?6, days_of_month = ?7,
                 is_active = ?8, updated_at = ?9
             WHERE id = ?10",
            rusqlite::params![
                merged.name,
                merged.kind.to_string(),
                merged.time_of_day,
                merged.start_date.format(DATE_FMT).to_string(),
                merged.end_date.map(|d| d.format(DATE_FMT).to_string()),
                merged.days_of_week,
                merged.days_of_month,
                merged.is_active,
                merged.updated_at,
                id
            ],
        )?;
        let cancelled = cancel_future_pending_in(&tx, id, cancel_from)?;
        let created = insert_jobs_in(&tx, regenerated)?;
        tx.commit()?;

        info!(cancelled, created, "schedule updated, future jobs swapped");
        Ok(merged)
    }

    /// Remove a schedule, cancelling its future PENDING jobs in the same
    /// transaction. Past jobs keep their schedule_id for the audit trail.
    pub fn delete_schedule(&self, id: &str, cancel_from: &DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let cancelled = cancel_future_pending_in(&tx, id, cancel_from)?;
        let n = tx.execute("DELETE FROM schedules WHERE id = ?1", [id])?;
        tx.commit()?;
        if n == 0 {
            return Err(StoreError::NotFound {
                what: "schedule",
                id: id.to_string(),
            });
        }
        info!(schedule_id = %id, cancelled, "schedule deleted");
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use chrono::TimeZone;
    use kirim_core::types::JobStatus;

    fn daily(post_id: &str) -> NewSchedule {
        NewSchedule {
            name: None,
            post_id: post_id.to_string(),
            kind: ScheduleKind::Daily,
            time_of_day: "09:00".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            end_date: None,
            days_of_week: None,
            days_of_month: None,
            is_active: true,
        }
    }

    fn t(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, d, h, 0, 0).unwrap()
    }

    #[test]
    fn create_get_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let s = store.create_schedule(daily("p1")).unwrap();
        let got = store.get_schedule(&s.id).unwrap().unwrap();
        assert_eq!(got.kind, ScheduleKind::Daily);
        assert_eq!(got.time_of_day, "09:00");
        assert_eq!(got.start_date, NaiveDate::from_ymd_opt(2026, 8, 1).unwrap());
    }

    #[test]
    fn active_filter_excludes_disabled() {
        let store = Store::open_in_memory().unwrap();
        let a = store.create_schedule(daily("p1")).unwrap();
        store.create_schedule(daily("p2")).unwrap();
        store
            .apply_schedule_update(
                &a.id,
                UpdateSchedule {
                    is_active: Some(false),
                    ..Default::default()
                },
                &t(1, 0),
                &[],
            )
            .unwrap();
        assert_eq!(store.active_schedules().unwrap().len(), 1);
    }

    #[test]
    fn update_swaps_future_jobs_atomically() {
        let store = Store::open_in_memory().unwrap();
        let s = store.create_schedule(daily("p1")).unwrap();
        store
            .insert_jobs_skip_existing(&[
                NewJob {
                    schedule_id: Some(s.id.clone()),
                    post_id: "p1".to_string(),
                    scheduled_at: t(7, 9),
                },
                NewJob {
                    schedule_id: Some(s.id.clone()),
                    post_id: "p1".to_string(),
                    scheduled_at: t(8, 9),
                },
            ])
            .unwrap();

        // Edit: switch to 10:00 sends, regenerating both days.
        let regenerated = vec![
            NewJob {
                schedule_id: Some(s.id.clone()),
                post_id: "p1".to_string(),
                scheduled_at: t(7, 10),
            },
            NewJob {
                schedule_id: Some(s.id.clone()),
                post_id: "p1".to_string(),
                scheduled_at: t(8, 10),
            },
        ];
        store
            .apply_schedule_update(
                &s.id,
                UpdateSchedule {
                    time_of_day: Some("10:00".to_string()),
                    ..Default::default()
                },
                &t(6, 0),
                &regenerated,
            )
            .unwrap();

        let jobs = store.jobs_for_schedule(&s.id).unwrap();
        let cancelled: Vec<_> = jobs
            .iter()
            .filter(|j| j.status == JobStatus::Cancelled)
            .collect();
        let pending: Vec<_> = jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .collect();
        assert_eq!(cancelled.len(), 2);
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|j| j.scheduled_at.format("%H:%M").to_string() == "10:00"));
    }

    #[test]
    fn delete_cancels_future_pending() {
        let store = Store::open_in_memory().unwrap();
        let s = store.create_schedule(daily("p1")).unwrap();
        store
            .insert_jobs_skip_existing(&[NewJob {
                schedule_id: Some(s.id.clone()),
                post_id: "p1".to_string(),
                scheduled_at: t(20, 9),
            }])
            .unwrap();

        let cancelled = store.delete_schedule(&s.id, &t(10, 0)).unwrap();
        assert_eq!(cancelled, 1);
        assert!(store.get_schedule(&s.id).unwrap().is_none());
        // Audit row survives as cancelled.
        let jobs = store.jobs_for_schedule(&s.id).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Cancelled);
    }
}
