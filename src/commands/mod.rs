//! CLI command implementations.
//!
//! Each submodule implements a sandbox-keeper command with pure formatting
//! separated from IO for testability.

pub mod diagnose;
pub mod keepalive;
pub mod serve;

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::config::SandboxConfig;
use crate::sandbox::{self, Sandbox};

/// Connects the configured sandbox, failing when none is configured.
pub(crate) async fn require_sandbox(config: &SandboxConfig) -> Result<Arc<dyn Sandbox>> {
    match sandbox::connect(config).await? {
        Some(sandbox) => Ok(sandbox),
        None => bail!("No active sandbox: set [sandbox] backend in sandbox-keeper.toml"),
    }
}
