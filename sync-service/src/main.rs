//! transfer-service binary entry point.
//!
//! Usage:
//! ```bash
//! transfer-service check --config transfer.toml
//! transfer-service purge --config transfer.toml
//! transfer-service maintain --config transfer.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use sync_medium::spawn_cleanup_task;
use cmdb_sync_service::{open_medium, Config};
use tracing_subscriber::EnvFilter;

/// Cross-environment CMDB transfer service.
#[derive(Parser, Debug)]
#[command(name = "transfer-service")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, short, global = true, default_value = "transfer.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration and open the transfer medium
    Check,

    /// Delete expired payloads from the transfer medium
    Purge,

    /// Run the expiry cleanup loop on the transfer medium until Ctrl+C
    Maintain,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Check => {
            let rules = config.rule_set()?;
            open_medium(&config.medium).await.context("opening transfer medium")?;
            println!("environment: {} ({})", config.sync.env, config.sync.role);
            println!("id rules:    {} source environment(s)", rules.envs().count());
            println!("medium:      {}", config.medium.database.display());
            println!("configuration OK");
        }
        Commands::Purge => {
            let medium = open_medium(&config.medium).await.context("opening transfer medium")?;
            let deleted = medium.cleanup_expired().await?;
            println!("deleted {} expired payload(s)", deleted);
        }
        Commands::Maintain => {
            let medium = open_medium(&config.medium).await.context("opening transfer medium")?;
            let handle = spawn_cleanup_task(Arc::new(medium), config.cleanup.clone());

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl+C")?;

            tracing::info!("Shutting down cleanup task");
            handle.abort();
        }
    }
    Ok(())
}
