//! sisyphus - label-driven merge queue for GitHub pull requests

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pr_sisyphus::config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default log filter when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "pr_sisyphus=info,sisyphus=info";

/// Log filter for `--verbose`
const VERBOSE_LOG_FILTER: &str = "pr_sisyphus=debug,sisyphus=debug,tower_http=debug";

#[derive(Parser)]
#[command(name = "sisyphus")]
#[command(about = "Label-driven single-lane merge queue for GitHub pull requests")]
#[command(version)]
struct Cli {
    /// Path to the config file (default: ~/.config/pr-sisyphus/config.toml)
    #[arg(long, global = true, env = "SISYPHUS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve webhooks and the scheduler endpoint
    Serve {
        /// Address to bind (overrides `server.listen`)
        #[arg(long)]
        listen: Option<String>,
    },

    /// Reconcile every repository of every installation once
    Sweep {
        /// Maximum repositories reconciled at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Run one reconciliation pass for a repository
    Reconcile {
        /// Repository as owner/name
        repo: String,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    // Logs go to stderr so command output on stdout stays clean
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { listen } => {
            cli::run_serve(&config, listen.as_deref()).await?;
        }
        Commands::Sweep { concurrency } => {
            cli::run_sweep_command(&config, concurrency).await?;
        }
        Commands::Reconcile { repo } => {
            cli::run_reconcile(&config, &repo).await?;
        }
    }

    Ok(())
}
