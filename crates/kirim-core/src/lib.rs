//! `kirim-core` — shared configuration, error type, and domain model.
//!
//! Every other crate in the workspace depends on this one. It holds the
//! things the whole system agrees on: what a [`types::Post`], a
//! [`types::Schedule`], and a [`types::ScheduledJob`] are, how the process
//! is configured, and the top-level error type.

pub mod config;
pub mod error;
pub mod types;

pub use error::{KirimError, Result};
