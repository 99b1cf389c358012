use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The recurrence definition is invalid (bad time_of_day, missing
    /// day-set). Fatal to the affected schedule only.
    #[error("Invalid schedule config: {0}")]
    Config(String),

    /// Storage failure. Propagates to the tick driver; the next tick
    /// retries naturally since generation and dispatch are idempotent.
    #[error(transparent)]
    Store(#[from] kirim_store::StoreError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
