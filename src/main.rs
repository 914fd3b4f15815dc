//! # Herald: Notification Distribution Server
//!
//! Usage:
//!   herald                          # ~/.herald/config.toml, or defaults
//!   herald --config ./herald.toml   # Explicit config file
//!   herald --port 8080              # Override the gateway port

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use herald_core::config::HeraldConfig;
use herald_db::SqliteStore;
use herald_scheduler::Herald;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "herald",
    version,
    about = "📣 Herald — severity-aware notification distribution"
)]
struct Cli {
    /// Config file (default: ~/.herald/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gateway port, overrides the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "herald=debug,herald_scheduler=debug,herald_gateway=debug,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => HeraldConfig::load_from(path)?,
        None => HeraldConfig::load()?,
    };
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    config.validate()?;

    let db_path = shellexpand::tilde(&config.database.path).to_string();
    let store = Arc::new(SqliteStore::open(std::path::Path::new(&db_path))?);
    let deliverers = herald_channels::default_deliverers(&config)?;

    let herald = Arc::new(Herald::new(config, store, deliverers));

    let mut failures = herald.subscribe_failures();
    tokio::spawn(async move {
        loop {
            match failures.recv().await {
                Ok(failure) => tracing::error!("💥 Task '{}' failed: {}", failure.task, failure.error),
                Err(RecvError::Lagged(missed)) => tracing::warn!("⚠️ {missed} task failure report(s) dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let sweeps = herald.spawn_sweeps();

    println!("📣 Herald v{}", env!("CARGO_PKG_VERSION"));
    println!("   🌐 API:      http://{}:{}/api/v1", herald.config().gateway.host, herald.config().gateway.port);
    println!("   🗄️  Database: {db_path}");
    println!();

    herald_gateway::start(herald.clone(), async {
        tokio::signal::ctrl_c().await.ok();
    })
    .await?;

    herald.shutdown();
    for sweep in sweeps {
        sweep.await.ok();
    }
    Ok(())
}
