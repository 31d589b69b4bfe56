//! Run the HTTP server.

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::health::recovery::RecoveryController;
use crate::sandbox::{self, SessionRegistry};
use crate::server::{self, AppState};

/// Address to listen on: the `--bind` flag wins over the config file.
pub fn bind_address(config: &Config, flag: Option<String>) -> String {
    flag.unwrap_or_else(|| config.server.bind.clone())
}

/// Entry point: registers the configured sandbox and serves until Ctrl-C
pub async fn run(config: &Config, bind: Option<String>) -> Result<()> {
    let registry = SessionRegistry::new();
    match sandbox::connect(&config.sandbox).await? {
        Some(active) => {
            if let Ok(Some(info)) = active.info() {
                info!("Registered sandbox {} ({})", info.sandbox_id, info.provider);
            }
            registry.register(active);
        }
        None => warn!("No sandbox configured; every endpoint will answer 404"),
    }

    let controller = RecoveryController::new(config.recovery.clone())?;
    let addr = bind_address(config, bind);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    server::serve(listener, AppState::new(registry, controller)).await
}
