//! Health checks and dev-server recovery for remote development sandboxes.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod health;
mod sandbox;
mod server;

use config::{Config, LoggingConfig};

#[derive(Parser)]
#[command(name = "sandbox-keeper")]
#[command(
    author,
    version,
    about = "Keep remote development sandboxes and their dev servers alive"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./sandbox-keeper.toml, then the user config directory)
    #[arg(short, long, global = true, env = "SANDBOX_KEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the diagnostics and keepalive endpoints over HTTP
    Serve {
        /// Address to listen on (overrides the config file)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Inspect the dev server inside the configured sandbox
    Diagnose {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the dev server and restart it if needed
    Keepalive {
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,

        /// Repeat every N seconds until interrupted
        #[arg(long, value_name = "SECS")]
        every: Option<u64>,
    },
}

/// Sets up stderr logging and, when configured, a daily log file.
///
/// The returned guard flushes the file writer on drop.
fn init_logging(verbose: bool, json: bool, logging: &LoggingConfig) -> Option<WorkerGuard> {
    let default_filter = if verbose {
        "sandbox_keeper=debug"
    } else {
        "sandbox_keeper=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (json_layer, text_layer) = if json {
        (Some(fmt::layer().json().with_writer(std::io::stderr)), None)
    } else {
        (None, Some(fmt::layer().with_writer(std::io::stderr)))
    };

    let (file_layer, guard) = match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "sandbox-keeper.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref())?;
    let _guard = init_logging(cli.verbose, cli.log_json, &config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            commands::serve::run(&config, bind).await?;
        }
        Commands::Diagnose { json } => {
            commands::diagnose::run(&config, json).await?;
        }
        Commands::Keepalive { json, every } => {
            commands::keepalive::run(&config, json, every).await?;
        }
    }

    Ok(())
}
