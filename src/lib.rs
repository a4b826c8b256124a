#![allow(clippy::doc_markdown)] // Allow technical terms like YugabyteDB, PostgreSQL in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # YugabyteDB Receiver
//!
//! Polls YugabyteDB session activity and turns it into a small set of
//! cluster-wide connection metrics.
//!
//! ## Overview
//!
//! Every collection interval the receiver opens one connection, runs a fixed
//! set of read-only queries against `pg_stat_activity` (or the cluster-wide
//! `gv$pg_stat_activity` view), folds the per-node rows into cluster totals,
//! closes the connection and hands one immutable batch to a consumer.
//!
//! Failures are soft: a failed connect skips the cycle, a failed query skips
//! its metric, an undecodable row is skipped, and a rejected batch is dropped.
//! Only cancellation stops the loop.
//!
//! ## Module Organization
//!
//! - [`config`] - Connection settings, query mode, TLS mode, loader
//! - [`queries`] - Query catalogue and raw row model
//! - [`database`] - Per-cycle connection and query execution
//! - [`normalizer`] - Session state normalization
//! - [`aggregator`] - Streaming cross-node aggregation
//! - [`metrics`] - Data points, batches and the per-cycle builder
//! - [`emitter`] - Consumer trait and batch delivery
//! - [`cycle`] - Cycle orchestration state machine
//! - [`scheduler`] - Fixed-cadence scrape loop
//! - [`receiver`] - Start/shutdown lifecycle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use yugabytedb_receiver::{ChannelConsumer, ReceiverConfig, YugabyteDbReceiver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (consumer, mut batches) = ChannelConsumer::channel(16);
//! let mut receiver = YugabyteDbReceiver::new(ReceiverConfig::default(), Arc::new(consumer))?;
//! receiver.start()?;
//!
//! if let Some(batch) = batches.recv().await {
//!     println!("{} data points", batch.len());
//! }
//!
//! receiver.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod config;
pub mod cycle;
pub mod database;
pub mod emitter;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod normalizer;
pub mod queries;
pub mod receiver;
pub mod scheduler;

pub use aggregator::{Aggregate, AggregationKey};
pub use config::{ReceiverConfig, TlsMode};
pub use cycle::{CycleOrchestrator, CycleOutcome, CycleReport, CycleState, Scraper};
pub use database::{ActivitySession, Connector, PgConnector};
pub use emitter::{ChannelConsumer, Emitter, LoggingConsumer, MetricsConsumer};
pub use error::{ReceiverError, Result};
pub use metrics::{MetricDataPoint, MetricName, MetricsBatch, MetricsBuilder};
pub use normalizer::normalize_state;
pub use queries::{ActivityQuery, NodeIdentity, QueryMode, RawRow};
pub use receiver::{YugabyteDbReceiver, TYPE_STR};
pub use scheduler::Scheduler;
