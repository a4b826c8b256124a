//! # Scrape Cycle Orchestration
//!
//! One cycle walks `Idle → Connecting → Querying ⇄ Aggregating → Emitting → Idle`.
//! Rows are folded while they stream in during `Querying`; `Aggregating` only
//! records a finished query's totals into the batch.
//!
//! - A failed connect ends the cycle immediately; nothing is emitted.
//! - A failed query skips only its own metric; the remaining queries still run
//!   in their fixed order.
//! - The connection is closed on every path once it has been opened,
//!   including when a query panics (the panic is re-raised after closing).
//!   A close that outlasts the connect timeout is abandoned.
//! - Once cancellation is observed no batch is emitted.
//! - Cycles of one orchestrator never overlap: scheduled and ad-hoc cycles
//!   wait for each other.
//!
//! Nothing survives a cycle: the builder, the totals and the connection are
//! all owned by the call to [`CycleOrchestrator::run_cycle`].

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregator::fold_rows;
use crate::config::ReceiverConfig;
use crate::database::{ActivitySession, Connector};
use crate::emitter::{EmitOutcome, Emitter};
use crate::metrics::{resource_attributes, MetricsBuilder};
use crate::queries::QueryMode;

/// Phase of a scrape cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Connecting,
    /// Streaming a query's rows through the aggregator
    Querying,
    /// Recording a finished query's totals into the batch
    Aggregating,
    Emitting,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Querying => "querying",
            Self::Aggregating => "aggregating",
            Self::Emitting => "emitting",
        };
        f.write_str(name)
    }
}

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Emitted,
    ConnectFailed,
    Cancelled,
    ConsumeFailed,
}

/// Summary of one finished cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub outcome: CycleOutcome,
    pub queries_succeeded: usize,
    pub queries_failed: usize,
    pub rows_skipped: usize,
    /// Data points handed to the consumer (zero unless emitted)
    pub data_points: usize,
    pub final_state: CycleState,
    pub duration: Duration,
}

/// Something the scheduler can run once per tick
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, cancel: &CancellationToken) -> CycleReport;
}

struct CycleTracker {
    cycle: u64,
    state: CycleState,
    started: Instant,
    queries_succeeded: usize,
    queries_failed: usize,
    rows_skipped: usize,
}

impl CycleTracker {
    fn new(cycle: u64) -> Self {
        Self {
            cycle,
            state: CycleState::Idle,
            started: Instant::now(),
            queries_succeeded: 0,
            queries_failed: 0,
            rows_skipped: 0,
        }
    }

    fn enter(&mut self, next: CycleState) {
        if self.state != next {
            debug!(cycle = self.cycle, from = %self.state, to = %next, "Cycle state transition");
            self.state = next;
        }
    }

    fn finish(mut self, outcome: CycleOutcome, data_points: usize) -> CycleReport {
        self.enter(CycleState::Idle);
        CycleReport {
            cycle: self.cycle,
            outcome,
            queries_succeeded: self.queries_succeeded,
            queries_failed: self.queries_failed,
            rows_skipped: self.rows_skipped,
            data_points,
            final_state: self.state,
            duration: self.started.elapsed(),
        }
    }
}

/// Runs connect, query, aggregate and emit for one poll
pub struct CycleOrchestrator {
    connector: Arc<dyn Connector>,
    emitter: Emitter,
    mode: QueryMode,
    resource: BTreeMap<String, String>,
    close_timeout: Duration,
    cycles: AtomicU64,
    in_flight: Mutex<()>,
}

impl fmt::Debug for CycleOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CycleOrchestrator")
            .field("mode", &self.mode)
            .field("resource", &self.resource)
            .field("cycles", &self.cycles.load(Ordering::Relaxed))
            .finish()
    }
}

impl CycleOrchestrator {
    pub fn new(config: &ReceiverConfig, connector: Arc<dyn Connector>, emitter: Emitter) -> Self {
        Self {
            connector,
            emitter,
            mode: config.mode,
            resource: resource_attributes(config),
            close_timeout: config.connect_timeout(),
            cycles: AtomicU64::new(0),
            in_flight: Mutex::new(()),
        }
    }

    /// Number of cycles started so far
    pub fn cycles_started(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Run one full scrape cycle.
    ///
    /// Waits for any cycle already in flight on this orchestrator to finish.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let in_flight = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            guard = self.in_flight.lock() => Some(guard),
        };

        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let mut tracker = CycleTracker::new(cycle);

        if in_flight.is_none() || cancel.is_cancelled() {
            return tracker.finish(CycleOutcome::Cancelled, 0);
        }

        tracker.enter(CycleState::Connecting);
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(cycle, "Shutdown requested while connecting");
                return tracker.finish(CycleOutcome::Cancelled, 0);
            }
            opened = self.connector.open() => opened,
        };

        let mut session = match opened {
            Ok(session) => session,
            Err(e) => {
                error!(
                    cycle,
                    error_kind = e.kind(),
                    error = %e,
                    "Failed to connect to YugabyteDB, skipping cycle"
                );
                return tracker.finish(CycleOutcome::ConnectFailed, 0);
            }
        };

        let mut builder = MetricsBuilder::new(self.resource.clone(), Utc::now());
        let collected = AssertUnwindSafe(self.collect(
            session.as_mut(),
            &mut builder,
            &mut tracker,
            cancel,
        ))
        .catch_unwind()
        .await;

        match tokio::time::timeout(self.close_timeout, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(cycle, error = %e, "Failed to close database connection"),
            Err(_) => warn!(
                cycle,
                timeout_ms = self.close_timeout.as_millis() as u64,
                "Timed out closing database connection, abandoning it"
            ),
        }

        let completed = match collected {
            Ok(completed) => completed,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        if !completed || cancel.is_cancelled() {
            info!(cycle, "Shutdown requested, discarding cycle metrics");
            return tracker.finish(CycleOutcome::Cancelled, 0);
        }

        tracker.enter(CycleState::Emitting);
        let (outcome, data_points) = match self.emitter.emit(builder, cancel).await {
            EmitOutcome::Delivered { data_points } => (CycleOutcome::Emitted, data_points),
            EmitOutcome::Dropped => (CycleOutcome::ConsumeFailed, 0),
            EmitOutcome::Cancelled => (CycleOutcome::Cancelled, 0),
        };

        let report = tracker.finish(outcome, data_points);
        info!(
            cycle,
            outcome = ?report.outcome,
            queries_succeeded = report.queries_succeeded,
            queries_failed = report.queries_failed,
            rows_skipped = report.rows_skipped,
            data_points = report.data_points,
            duration_ms = report.duration.as_millis() as u64,
            "Scrape cycle finished"
        );
        report
    }

    /// Run every query of the mode in order. Returns `false` if cancelled.
    async fn collect(
        &self,
        session: &mut dyn ActivitySession,
        builder: &mut MetricsBuilder,
        tracker: &mut CycleTracker,
        cancel: &CancellationToken,
    ) -> bool {
        for &query in self.mode.query_set() {
            if cancel.is_cancelled() {
                return false;
            }

            tracker.enter(CycleState::Querying);
            let folded = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(cycle = tracker.cycle, query = %query, "Shutdown requested mid-query");
                    return false;
                }
                folded = fold_rows(query, session.fetch(query)) => folded,
            };

            match folded {
                Ok(outcome) => {
                    tracker.enter(CycleState::Aggregating);
                    let points = builder.record_aggregate(query.metric(), &outcome.aggregate);
                    tracker.queries_succeeded += 1;
                    tracker.rows_skipped += outcome.rows_skipped;
                    debug!(
                        cycle = tracker.cycle,
                        query = %query,
                        rows = outcome.rows_folded,
                        rows_skipped = outcome.rows_skipped,
                        data_points = points,
                        total = outcome.aggregate.total(),
                        "Collected metric"
                    );
                }
                Err(e) => {
                    tracker.queries_failed += 1;
                    error!(
                        cycle = tracker.cycle,
                        query = %query,
                        error_kind = e.kind(),
                        error = %e,
                        "Query failed, skipping metric for this cycle"
                    );
                }
            }
        }
        true
    }
}

#[async_trait]
impl Scraper for CycleOrchestrator {
    async fn scrape(&self, cancel: &CancellationToken) -> CycleReport {
        self.run_cycle(cancel).await
    }
}
