//! fleetd — the FleetGrid control plane CLI.
//!
//! Opens the configured stores and runs one application, config, or secret
//! operation per invocation. Results are printed to stdout as JSON; logs go
//! to stderr.
//!
//! # Usage
//!
//! ```text
//! fleetd --config fleetgrid.toml app create --namespace t1 --file app.json
//! fleetd app create --namespace t1 --file app.json --base agent --base-namespace system
//! fleetd refs config agent-conf --namespace t1
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fleet_core::FleetConfig;
use tracing::debug;

mod commands;

#[derive(Parser)]
#[command(name = "fleetd", about = "FleetGrid control plane", version)]
struct Cli {
    /// Path to fleetgrid.toml. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override [store].data_dir.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Manage applications.
    App {
        #[command(subcommand)]
        action: AppAction,
    },
    /// Manage configs.
    Config {
        #[command(subcommand)]
        action: DataAction,
    },
    /// Manage secrets.
    Secret {
        #[command(subcommand)]
        action: DataAction,
    },
    /// Show which applications reference a config or secret.
    Refs {
        #[command(subcommand)]
        target: RefTarget,
    },
}

#[derive(Subcommand)]
pub(crate) enum AppAction {
    Get {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
        #[arg(long)]
        version: Option<String>,
    },
    /// Create an application from a JSON file, optionally on top of a base.
    Create {
        #[arg(short, long, default_value = "default")]
        namespace: String,
        #[arg(short, long)]
        file: PathBuf,
        /// Name of the base application.
        #[arg(long)]
        base: Option<String>,
        /// Namespace of the base application (default: --namespace).
        #[arg(long, requires = "base")]
        base_namespace: Option<String>,
    },
    Update {
        #[arg(short, long, default_value = "default")]
        namespace: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    Delete {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
        /// Version to mark deleted in history (default: current).
        #[arg(long)]
        version: Option<String>,
    },
    List {
        #[arg(short, long, default_value = "default")]
        namespace: String,
        #[arg(long)]
        name_contains: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        continue_from: Option<String>,
    },
    /// Show recorded versions of an application.
    History {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum DataAction {
    Get {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    Create {
        #[arg(short, long, default_value = "default")]
        namespace: String,
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub(crate) enum RefTarget {
    Config {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    Secret {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => FleetConfig::from_file(path)?,
        None => FleetConfig::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.store.data_dir = data_dir;
    }

    // Initialize tracing.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.log.filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    debug!(data_dir = ?config.store.data_dir, "configuration loaded");

    let output = commands::run(&config, cli.command)?;
    println!("{output}");
    Ok(())
}
