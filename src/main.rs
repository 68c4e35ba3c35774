//! ledger-sync command line.
//!
//! ```text
//!  config.toml ─▶ loader ─▶ bootstrap ─┬─▶ RpcLedger ──────┐
//!                                      ├─▶ IndexerClient ──┤
//!                                      │                   ▼
//!                                      │        DataServiceRegistry
//!                                      │   tokens · transfers · streams
//!                                      │                   │
//!                                      │                   ▼
//!                                      └──────────────▶ DataBus ─▶ log / stdout
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ledger_sync::config::{load_config, SyncConfig};
use ledger_sync::domain::DomainType;
use ledger_sync::lifecycle::{bootstrap, shutdown_signal};
use ledger_sync::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "ledger-sync")]
#[command(about = "Keep a ledger account's balances, transfers and streams in sync", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "ledger-sync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background services and log every published snapshot
    Watch,
    /// Fetch one domain once and print it as JSON
    Snapshot {
        /// tokens, transfers or streams
        domain: DomainType,
    },
    /// Validate the configuration and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let result = match cli.command {
        Commands::CheckConfig => {
            println!("{}: OK", cli.config.display());
            Ok(())
        }
        Commands::Snapshot { domain } => snapshot(config, domain).await,
        Commands::Watch => watch(config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "ledger-sync failed");
            ExitCode::FAILURE
        }
    }
}

async fn snapshot(config: SyncConfig, domain: DomainType) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = bootstrap(config).await?;
    let snapshot = runtime.registry.refresh(domain).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot.to_json()?)?);
    Ok(())
}

async fn watch(config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let runtime = bootstrap(config).await?;

    let _subscriptions: Vec<_> = DomainType::ALL
        .iter()
        .map(|&domain| {
            runtime.bus.subscribe(domain, move |snapshot| {
                tracing::info!(
                    domain = %snapshot.domain_type(),
                    items = snapshot.len(),
                    "Snapshot published"
                );
            })
        })
        .collect();

    let started = runtime.registry.initialize();
    tracing::info!(domains = started.len(), "ledger-sync watching");

    shutdown_signal().await;
    runtime.registry.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
