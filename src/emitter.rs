//! Metrics emission to downstream consumers

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ReceiverError, Result};
use crate::metrics::{MetricsBatch, MetricsBuilder};

/// Downstream ingestion of finished batches
#[async_trait]
pub trait MetricsConsumer: Send + Sync {
    /// Accept one cycle's batch
    async fn consume_metrics(&self, batch: MetricsBatch) -> Result<()>;
}

/// What happened to a cycle's batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Delivered { data_points: usize },
    /// The consumer rejected the batch; it is not retried
    Dropped,
    /// Shutdown was requested while the consumer was still ingesting
    Cancelled,
}

/// Hands each cycle's batch to the consumer exactly once
#[derive(Clone)]
pub struct Emitter {
    consumer: Arc<dyn MetricsConsumer>,
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("consumer", &"dyn MetricsConsumer")
            .finish()
    }
}

impl Emitter {
    pub fn new(consumer: Arc<dyn MetricsConsumer>) -> Self {
        Self { consumer }
    }

    /// Build the batch and forward it.
    ///
    /// The consumer call has no timeout: a slow consumer delays the next
    /// cycle. Only shutdown interrupts it.
    #[instrument(skip(self, builder, cancel), fields(data_points = builder.len()))]
    pub async fn emit(&self, builder: MetricsBuilder, cancel: &CancellationToken) -> EmitOutcome {
        let batch = builder.build();
        let data_points = batch.len();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(data_points, "Shutdown requested during metrics ingestion, batch abandoned");
                EmitOutcome::Cancelled
            }
            result = self.consumer.consume_metrics(batch) => match result {
                Ok(()) => {
                    debug!(data_points, "Metrics batch delivered");
                    EmitOutcome::Delivered { data_points }
                }
                Err(e) => {
                    error!(
                        error_kind = e.kind(),
                        error = %e,
                        data_points,
                        "Failed to consume metrics"
                    );
                    EmitOutcome::Dropped
                }
            }
        }
    }
}

/// Forwards batches into a bounded channel
#[derive(Debug, Clone)]
pub struct ChannelConsumer {
    sender: mpsc::Sender<MetricsBatch>,
}

impl ChannelConsumer {
    pub fn new(sender: mpsc::Sender<MetricsBatch>) -> Self {
        Self { sender }
    }

    /// Create a consumer together with the receiving half of its channel
    pub fn channel(buffer_size: usize) -> (Self, mpsc::Receiver<MetricsBatch>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl MetricsConsumer for ChannelConsumer {
    async fn consume_metrics(&self, batch: MetricsBatch) -> Result<()> {
        self.sender
            .send(batch)
            .await
            .map_err(|_| ReceiverError::consume("metrics channel closed"))
    }
}

/// Writes each batch to the log as a JSON document
#[derive(Debug, Clone, Default)]
pub struct LoggingConsumer;

#[async_trait]
impl MetricsConsumer for LoggingConsumer {
    async fn consume_metrics(&self, batch: MetricsBatch) -> Result<()> {
        let payload = serde_json::to_string(&batch)
            .map_err(|e| ReceiverError::consume(format!("failed to serialize batch: {e}")))?;
        info!(
            data_points = batch.len(),
            collected_at = %batch.collected_at().to_rfc3339(),
            batch = %payload,
            "Metrics batch"
        );
        Ok(())
    }
}
