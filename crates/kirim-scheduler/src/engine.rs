use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use kirim_channels::Messenger;
use kirim_store::Store;

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::generator;

/// What one tick accomplished.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TickSummary {
    pub jobs_generated: usize,
    pub jobs_processed: usize,
    /// True when the tick was skipped because another was still running.
    pub skipped: bool,
}

/// Orchestrates one tick: extend every active schedule's job horizon, then
/// dispatch whatever is due.
///
/// Owns its store connection and the long-lived messenger handle. A single
/// driver instance serves both the interval loop and the on-demand HTTP
/// trigger; overlapping invocations are skipped, never run concurrently.
pub struct TickDriver {
    store: Store,
    messenger: Arc<dyn Messenger>,
    dispatcher: Dispatcher,
    tz: Tz,
    horizon_days: u32,
    poll_interval: Duration,
    tick_guard: tokio::sync::Mutex<()>,
}

impl TickDriver {
    pub fn new(
        store: Store,
        messenger: Arc<dyn Messenger>,
        tz: Tz,
        horizon_days: u32,
        poll_interval: Duration,
        job_timeout: Duration,
        media_timeout: Duration,
    ) -> Self {
        Self {
            store,
            messenger,
            dispatcher: Dispatcher::new(job_timeout, media_timeout),
            tz,
            horizon_days,
            poll_interval,
            tick_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one generate-then-dispatch pass.
    ///
    /// Idempotent modulo time passing. One schedule's generation failure is
    /// logged and skipped — the others still proceed, and the next tick
    /// retries naturally. Only a storage-level failure (due-query, status
    /// writes) aborts the tick.
    pub async fn run_once(&self) -> Result<TickSummary> {
        let Ok(_guard) = self.tick_guard.try_lock() else {
            debug!("previous tick still running; skipping");
            return Ok(TickSummary {
                skipped: true,
                ..Default::default()
            });
        };

        let now = Utc::now();
        let mut jobs_generated = 0usize;

        for schedule in self.store.active_schedules()? {
            match generator::ensure_jobs(&self.store, &schedule, &now, self.horizon_days, self.tz)
            {
                Ok(created) => jobs_generated += created,
                Err(e) => {
                    warn!(schedule_id = %schedule.id, error = %e, "job generation failed; continuing");
                }
            }
        }

        // One destination read per tick, passed down — dispatch never does
        // its own config lookup.
        let destination = self.store.get_destination()?;
        let jobs_processed = self
            .dispatcher
            .process_due(
                &self.store,
                self.messenger.as_ref(),
                destination.as_ref(),
                &now,
            )
            .await?;

        if jobs_generated > 0 || jobs_processed > 0 {
            info!(jobs_generated, jobs_processed, "tick complete");
        }
        Ok(TickSummary {
            jobs_generated,
            jobs_processed,
            skipped: false,
        })
    }

    /// Main loop. Ticks at the configured interval until `shutdown`
    /// broadcasts `true`.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            horizon_days = self.horizon_days,
            "tick driver started"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!("tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("tick driver shutting down");
                        break;
                    }
                }
            }
        }
    }
}
