//! Receiver lifecycle: wiring, start and shutdown.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ReceiverConfig;
use crate::cycle::{CycleOrchestrator, CycleReport, Scraper};
use crate::database::{Connector, PgConnector};
use crate::emitter::{Emitter, MetricsConsumer};
use crate::error::Result;
use crate::scheduler::Scheduler;

/// Component type under which the receiver is registered in a host pipeline
pub const TYPE_STR: &str = "yugabytedb";

/// Periodically scrapes one YugabyteDB endpoint and feeds a consumer
pub struct YugabyteDbReceiver {
    receiver_id: Uuid,
    config: ReceiverConfig,
    orchestrator: Arc<CycleOrchestrator>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<u64>>,
}

impl std::fmt::Debug for YugabyteDbReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YugabyteDbReceiver")
            .field("receiver_id", &self.receiver_id)
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

impl YugabyteDbReceiver {
    /// Create a receiver that connects with sqlx
    pub fn new(config: ReceiverConfig, consumer: Arc<dyn MetricsConsumer>) -> Result<Self> {
        let connector = Arc::new(PgConnector::new(config.clone()));
        Self::with_connector(config, connector, consumer)
    }

    /// Create a receiver with a custom connector
    pub fn with_connector(
        config: ReceiverConfig,
        connector: Arc<dyn Connector>,
        consumer: Arc<dyn MetricsConsumer>,
    ) -> Result<Self> {
        config.validate()?;

        let receiver_id = Uuid::new_v4();
        let orchestrator = Arc::new(CycleOrchestrator::new(
            &config,
            connector,
            Emitter::new(consumer),
        ));

        info!(
            receiver_id = %receiver_id,
            host = %config.host,
            port = config.port,
            mode = %config.mode,
            interval_seconds = config.collection_interval_seconds,
            "Creating YugabyteDB receiver"
        );

        Ok(Self {
            receiver_id,
            config,
            orchestrator,
            cancel: CancellationToken::new(),
            handle: None,
        })
    }

    pub fn receiver_id(&self) -> Uuid {
        self.receiver_id
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Spawn the scrape loop on the current tokio runtime
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            warn!(receiver_id = %self.receiver_id, "Receiver already running");
            return Ok(());
        }

        self.cancel = CancellationToken::new();
        let scraper: Arc<dyn Scraper> = self.orchestrator.clone();
        let scheduler = Scheduler::new(scraper, self.config.collection_interval());
        let cancel = self.cancel.clone();

        info!(receiver_id = %self.receiver_id, "Starting YugabyteDB receiver");
        self.handle = Some(tokio::spawn(async move { scheduler.run(cancel).await }));
        Ok(())
    }

    /// Stop the scrape loop and wait for it to exit
    pub async fn shutdown(&mut self) -> Result<()> {
        self.cancel.cancel();

        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(cycles) => info!(
                    receiver_id = %self.receiver_id,
                    cycles,
                    "YugabyteDB receiver stopped"
                ),
                Err(e) => error!(
                    receiver_id = %self.receiver_id,
                    error = %e,
                    "Scrape loop terminated abnormally"
                ),
            }
        }
        Ok(())
    }

    /// Run a single cycle outside the schedule
    pub async fn scrape_once(&self) -> CycleReport {
        self.orchestrator.run_cycle(&self.cancel).await
    }
}
