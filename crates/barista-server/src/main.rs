//! barista server entry point.
//!
//! Thin wrapper: parse flags, set up tracing and the journal file, build the
//! café and run the accept loop until Ctrl-C.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use barista_core::{CafeBuilder, CafeConfig, FileSink, Journal, Kind};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "barista", version, about = "Virtual café order-fulfillment server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BARISTA_ADDR", default_value = "0.0.0.0:50000")]
    addr: SocketAddr,

    /// Append-only JSON lines event log.
    #[arg(long, env = "BARISTA_JOURNAL", default_value = "barista_log.json")]
    journal: PathBuf,

    /// Seconds to prepare one batch of tea.
    #[arg(long, default_value = "30")]
    tea_secs: u64,

    /// Seconds to prepare one batch of coffee.
    #[arg(long, default_value = "45")]
    coffee_secs: u64,

    /// Units of one kind prepared together.
    #[arg(long, default_value = "2")]
    batch_size: u32,
}

impl Args {
    fn config(&self) -> CafeConfig {
        CafeConfig::default()
            .with_batch_size(self.batch_size)
            .with_preparation(Kind::Tea, Duration::from_secs(self.tea_secs))
            .with_preparation(Kind::Coffee, Duration::from_secs(self.coffee_secs))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let (journal, journal_worker) = Journal::spawn(FileSink::new(&args.journal));
    let cafe = CafeBuilder::new()
        .with_config(args.config())
        .with_journal(journal)
        .build()
        .context("invalid café configuration")?;

    let listener = TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;
    info!(
        addr = %args.addr,
        journal = %args.journal.display(),
        batch_size = args.batch_size,
        tea_secs = args.tea_secs,
        coffee_secs = args.coffee_secs,
        "barista started"
    );

    barista_core::serve(listener, cafe, shutdown_signal())
        .await
        .context("server crashed")?;

    // Live sessions still hold journal handles; don't wait on them.
    journal_worker.abort();
    info!("barista stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
