//! Fixed-cadence scrape loop.
//!
//! Exactly one cycle runs at a time. The ticker uses
//! [`MissedTickBehavior::Delay`]: ticks missed while a slow cycle runs collapse
//! into a single immediate tick, and the schedule restarts one interval after
//! it, so cycles start at most every `max(interval, cycle_duration)`.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cycle::{CycleOutcome, Scraper};

/// Drives a [`Scraper`] at a fixed interval until cancelled
#[derive(Clone)]
pub struct Scheduler {
    scraper: Arc<dyn Scraper>,
    interval: Duration,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("interval", &self.interval)
            .finish()
    }
}

impl Scheduler {
    pub fn new(scraper: Arc<dyn Scraper>, interval: Duration) -> Self {
        Self { scraper, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until `cancel` fires, returning the number of cycles started.
    ///
    /// The first cycle starts one interval after the call.
    pub async fn run(&self, cancel: CancellationToken) -> u64 {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_seconds = self.interval.as_secs_f64(),
            "Starting scrape loop"
        );

        let mut cycles = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            cycles += 1;
            let report = self.scraper.scrape(&cancel).await;
            debug!(
                cycle = report.cycle,
                outcome = ?report.outcome,
                duration_ms = report.duration.as_millis() as u64,
                "Scrape loop tick handled"
            );

            if report.outcome == CycleOutcome::Cancelled || cancel.is_cancelled() {
                break;
            }
        }

        info!(cycles, "Scrape loop stopped");
        cycles
    }
}
