//! `kirim-store` — SQLite persistence for posts, schedules, jobs, and the
//! destination config.
//!
//! One [`Store`] wraps one `rusqlite::Connection` behind a `Mutex`; each
//! subsystem (gateway, tick driver) opens its own connection against the
//! same WAL database file. All writes are single-row or set-scoped, so the
//! only cross-writer invariant — at most one non-cancelled job per
//! `(schedule_id, scheduled_at)` — is enforced by a partial UNIQUE index
//! rather than application-level locking.

pub mod db;
pub mod error;

mod categories;
mod destination;
mod jobs;
mod posts;
mod schedules;

pub use error::{Result, StoreError};
pub use jobs::NewJob;
pub use posts::{NewPost, PostFilter, UpdatePost};
pub use schedules::{NewSchedule, UpdateSchedule};

use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

/// Thread-safe handle over the kirim database.
///
/// Wraps a single SQLite connection in a `Mutex`. For high-concurrency
/// deployments consider a connection pool, but a Mutex per subsystem
/// connection is sufficient for the single-node target.
pub struct Store {
    db: Mutex<Connection>,
}

impl Store {
    /// Wrap a connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap()
    }

    /// Open an in-memory store. Test helper.
    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }
}
