//! # YugabyteDB Receiver
//!
//! Runs the scrape loop against one YugabyteDB endpoint and logs every metrics
//! batch as JSON.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use yugabytedb_receiver::logging::init_tracing;
use yugabytedb_receiver::{CycleOutcome, LoggingConsumer, ReceiverConfig, YugabyteDbReceiver};

#[derive(Parser)]
#[command(name = "yugabytedb-receiver")]
#[command(about = "Scrape YugabyteDB session activity into connection metrics")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (YAML, TOML or JSON); YUGABYTEDB_* variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = ReceiverConfig::load(cli.config.as_deref())?;
    let mut receiver = YugabyteDbReceiver::new(config, Arc::new(LoggingConsumer))?;

    if cli.once {
        let report = receiver.scrape_once().await;
        info!(
            outcome = ?report.outcome,
            data_points = report.data_points,
            "Single scrape finished"
        );
        if report.outcome != CycleOutcome::Emitted {
            anyhow::bail!("scrape did not emit metrics: {:?}", report.outcome);
        }
        return Ok(());
    }

    receiver.start()?;
    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, shutting down");
    receiver.shutdown().await?;
    Ok(())
}
