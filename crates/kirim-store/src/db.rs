use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;

use crate::error::Result;

/// Initialise the kirim schema in `conn`.
///
/// Idempotent — every statement is `IF NOT EXISTS`, so this runs on every
/// process start for every connection.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS categories (
            id          TEXT    NOT NULL PRIMARY KEY,
            name        TEXT    NOT NULL UNIQUE,
            created_at  TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS posts (
            id          TEXT    NOT NULL PRIMARY KEY,
            category_id TEXT,
            title       TEXT,
            caption     TEXT    NOT NULL,
            media_type  TEXT    NOT NULL DEFAULT 'text',
            media_url   TEXT    NOT NULL DEFAULT '',
            is_active   INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS schedules (
            id            TEXT    NOT NULL PRIMARY KEY,
            name          TEXT,
            post_id       TEXT    NOT NULL,
            kind          TEXT    NOT NULL,
            time_of_day   TEXT    NOT NULL,   -- HH:MM
            start_date    TEXT    NOT NULL,   -- YYYY-MM-DD
            end_date      TEXT,               -- YYYY-MM-DD or NULL
            days_of_week  TEXT,               -- CSV weekday codes, weekly only
            days_of_month TEXT,               -- CSV day numbers, monthly only
            is_active     INTEGER NOT NULL DEFAULT 1,
            created_at    TEXT    NOT NULL,
            updated_at    TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS jobs (
            id            TEXT    NOT NULL PRIMARY KEY,
            schedule_id   TEXT,               -- NULL for send-now jobs
            post_id       TEXT    NOT NULL,
            scheduled_at  TEXT    NOT NULL,   -- RFC3339 UTC, second precision
            status        TEXT    NOT NULL DEFAULT 'pending',
            sent_at       TEXT,
            error_message TEXT,
            created_at    TEXT    NOT NULL,
            updated_at    TEXT    NOT NULL
        ) STRICT;

        -- Generation idempotence: at most one non-cancelled job per
        -- (schedule, instant). Duplicate inserts hit this index and are
        -- skipped via INSERT OR IGNORE. Cancelled rows are excluded, so a
        -- re-created schedule may legitimately reuse an instant.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_schedule_instant
            ON jobs (schedule_id, scheduled_at)
            WHERE status != 'cancelled' AND schedule_id IS NOT NULL;

        -- Efficient due polling: WHERE status = 'pending' AND scheduled_at <= ?
        CREATE INDEX IF NOT EXISTS idx_jobs_status_scheduled
            ON jobs (status, scheduled_at);

        CREATE TABLE IF NOT EXISTS destination_config (
            id          TEXT    NOT NULL PRIMARY KEY,
            destination TEXT    NOT NULL,
            kind        TEXT    NOT NULL DEFAULT 'single',
            updated_at  TEXT    NOT NULL
        ) STRICT;
        ",
    )?;
    Ok(())
}

/// Canonical timestamp encoding for instants: fixed-width RFC3339 UTC with
/// second precision ("2026-08-06T09:30:00Z"). Fixed width keeps SQL string
/// comparison equivalent to instant comparison.
pub fn encode_instant(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Inverse of [`encode_instant`]. Accepts any RFC3339 offset.
pub fn decode_instant(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// Wrap a stored-value parse failure as a rusqlite conversion error so row
/// mappers keep the plain `rusqlite::Result` signature.
pub(crate) fn conv_err(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
}
