//! `kirim-scheduler` — job generation and dispatch.
//!
//! # Overview
//!
//! Recurrence rules ([`kirim_core::types::Schedule`]) are expanded into
//! concrete UTC send-instants and materialized as PENDING jobs covering a
//! rolling horizon. A periodic tick then picks up due jobs and drives each
//! through a send/fail lifecycle against the injected
//! [`kirim_channels::Messenger`].
//!
//! | Stage      | Entry point                          | Behaviour                         |
//! |------------|--------------------------------------|-----------------------------------|
//! | Expansion  | [`expand::expand`]                   | pure, stateless, window → instants |
//! | Generation | [`generator::ensure_jobs`]           | idempotent horizon top-up          |
//! | Dispatch   | [`dispatcher::Dispatcher::process_due`] | sequential, oldest due first    |
//! | Driving    | [`engine::TickDriver`]               | one tick = generate then dispatch  |
//!
//! All calendar math (day boundaries, weekday/day-of-month membership,
//! time-of-day overlay) runs in the configured IANA zone; instants are
//! stored and compared in UTC.

pub mod clock;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod expand;
pub mod generator;

pub use dispatcher::Dispatcher;
pub use engine::{TickDriver, TickSummary};
pub use error::{Result, SchedulerError};
