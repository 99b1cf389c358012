use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use kirim_core::types::{JobStatus, ScheduledJob};

use crate::db::{conv_err, decode_instant, encode_instant};
use crate::error::{Result, StoreError};
use crate::Store;

/// A job to be materialized. The generator builds these in bulk; the
/// send-now action builds one with `schedule_id = None`.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub schedule_id: Option<String>,
    pub post_id: String,
    pub scheduled_at: DateTime<Utc>,
}

const JOB_COLUMNS: &str = "id, schedule_id, post_id, scheduled_at, status, sent_at, \
                           error_message, created_at, updated_at";

fn row_to_job(row: &Row) -> rusqlite::Result<ScheduledJob> {
    let scheduled_at: String = row.get(3)?;
    let status: String = row.get(4)?;
    let sent_at: Option<String> = row.get(5)?;
    Ok(ScheduledJob {
        id: row.get(0)?,
        schedule_id: row.get(1)?,
        post_id: row.get(2)?,
        scheduled_at: decode_instant(&scheduled_at).map_err(|e| conv_err(3, e.to_string()))?,
        status: status.parse().map_err(|e| conv_err(4, e))?,
        sent_at: sent_at
            .map(|s| decode_instant(&s).map_err(|e| conv_err(5, e.to_string())))
            .transpose()?,
        error_message: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Insert a batch of PENDING jobs, skipping any that collide with an
/// existing non-cancelled `(schedule_id, scheduled_at)` row. Returns the
/// number of rows actually inserted.
///
/// Works on a plain connection or inside a caller-owned transaction
/// (`Transaction` derefs to `Connection`).
pub(crate) fn insert_jobs_in(conn: &Connection, jobs: &[NewJob]) -> rusqlite::Result<usize> {
    let now = Utc::now().to_rfc3339();
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO jobs
         (id, schedule_id, post_id, scheduled_at, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5)",
    )?;
    let mut created = 0usize;
    for job in jobs {
        let id = Uuid::new_v4().to_string();
        created += stmt.execute(rusqlite::params![
            id,
            job.schedule_id,
            job.post_id,
            encode_instant(&job.scheduled_at),
            now
        ])?;
    }
    Ok(created)
}

/// Mark a schedule's future PENDING jobs CANCELLED. Set-scoped, single
/// statement; composable into a caller-owned transaction.
pub(crate) fn cancel_future_pending_in(
    conn: &Connection,
    schedule_id: &str,
    from: &DateTime<Utc>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE jobs SET status = 'cancelled', updated_at = ?1
         WHERE schedule_id = ?2 AND status = 'pending' AND scheduled_at >= ?3",
        rusqlite::params![Utc::now().to_rfc3339(), schedule_id, encode_instant(from)],
    )
}

impl Store {
    /// Insert one job. Unlike the bulk path this is not duplicate-tolerant —
    /// send-now jobs have no schedule and cannot collide.
    pub fn insert_job(&self, job: NewJob) -> Result<ScheduledJob> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO jobs
             (id, schedule_id, post_id, scheduled_at, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5)",
            rusqlite::params![
                id,
                job.schedule_id,
                job.post_id,
                encode_instant(&job.scheduled_at),
                now
            ],
        )?;
        Ok(ScheduledJob {
            id,
            schedule_id: job.schedule_id,
            post_id: job.post_id,
            scheduled_at: job.scheduled_at,
            status: JobStatus::Pending,
            sent_at: None,
            error_message: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Bulk insert with skip-existing semantics, in one transaction.
    /// Returns the number of rows actually created.
    #[instrument(skip(self, jobs), fields(count = jobs.len()))]
    pub fn insert_jobs_skip_existing(&self, jobs: &[NewJob]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let created = insert_jobs_in(&tx, jobs)?;
        tx.commit()?;
        Ok(created)
    }

    /// Latest non-cancelled instant materialized for a schedule, if any.
    /// The generator resumes one day after this.
    pub fn latest_scheduled_at(&self, schedule_id: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn();
        let latest: Option<String> = conn.query_row(
            "SELECT MAX(scheduled_at) FROM jobs
             WHERE schedule_id = ?1 AND status != 'cancelled'",
            [schedule_id],
            |row| row.get(0),
        )?;
        match latest {
            Some(s) => Ok(Some(decode_instant(&s).map_err(|e| {
                StoreError::Database(conv_err(0, e.to_string()))
            })?)),
            None => Ok(None),
        }
    }

    /// All PENDING jobs due at or before `now`, oldest first.
    pub fn due_jobs(&self, now: &DateTime<Utc>) -> Result<Vec<ScheduledJob>> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE status = 'pending' AND scheduled_at <= ?1
             ORDER BY scheduled_at ASC"
        ))?;
        let rows = stmt.query_map([encode_instant(now)], row_to_job)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn mark_sending(&self, id: &str) -> Result<()> {
        self.set_status(id, JobStatus::Sending, None, None)
    }

    pub fn mark_sent(&self, id: &str, sent_at: &DateTime<Utc>) -> Result<()> {
        self.set_status(id, JobStatus::Sent, Some(sent_at), None)
    }

    pub fn mark_failed(&self, id: &str, message: &str) -> Result<()> {
        self.set_status(id, JobStatus::Failed, None, Some(message))
    }

    fn set_status(
        &self,
        id: &str,
        status: JobStatus,
        sent_at: Option<&DateTime<Utc>>,
        error_message: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE jobs
             SET status = ?1, sent_at = COALESCE(?2, sent_at),
                 error_message = COALESCE(?3, error_message), updated_at = ?4
             WHERE id = ?5",
            rusqlite::params![
                status.to_string(),
                sent_at.map(encode_instant),
                error_message,
                Utc::now().to_rfc3339(),
                id
            ],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound {
                what: "job",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Cancel a schedule's future PENDING jobs. Returns the count cancelled.
    pub fn cancel_future_pending(
        &self,
        schedule_id: &str,
        from: &DateTime<Utc>,
    ) -> Result<usize> {
        let conn = self.conn();
        Ok(cancel_future_pending_in(&conn, schedule_id, from)?)
    }

    pub fn get_job(&self, id: &str) -> Result<Option<ScheduledJob>> {
        let conn = self.conn();
        match conn.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
            [id],
            row_to_job,
        ) {
            Ok(j) => Ok(Some(j)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    /// Recent jobs, newest scheduled first, optionally filtered by status.
    pub fn list_jobs(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<ScheduledJob>> {
        let conn = self.conn();
        let rows = match status {
            Some(status) => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE status = ?1
                     ORDER BY scheduled_at DESC LIMIT ?2"
                ))?;
                let rows = stmt.query_map(
                    rusqlite::params![status.to_string(), limit as i64],
                    row_to_job,
                )?;
                rows.filter_map(|r| r.ok()).collect()
            }
            None => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs
                     ORDER BY scheduled_at DESC LIMIT ?1"
                ))?;
                let rows = stmt.query_map([limit as i64], row_to_job)?;
                rows.filter_map(|r| r.ok()).collect()
            }
        };
        Ok(rows)
    }

    /// Every job belonging to a schedule, oldest first. Includes cancelled
    /// rows — the audit trail is the point.
    pub fn jobs_for_schedule(&self, schedule_id: &str) -> Result<Vec<ScheduledJob>> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE schedule_id = ?1
             ORDER BY scheduled_at ASC"
        ))?;
        let rows = stmt.query_map([schedule_id], row_to_job)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}
