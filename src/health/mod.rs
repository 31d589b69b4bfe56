//! Dev-server health checks and recovery.
//!
//! - `probe`: read-only diagnostics, safe to call at any frequency
//! - `report`: recommendations and response payloads
//! - `recovery`: restart the dev server when it is down
//! - `traffic`: keep the sandbox from idling out
//! - `shell`: the commands sent to the sandbox

pub(crate) mod probe;
pub(crate) mod recovery;
pub(crate) mod report;
pub(crate) mod shell;
pub(crate) mod traffic;

use std::time::Duration;
use tracing::debug;

use crate::sandbox::{CommandOutput, Sandbox, SandboxError};

/// A sandbox with a per-call deadline on every command.
#[derive(Clone, Copy)]
pub(crate) struct Shell<'a> {
    sandbox: &'a dyn Sandbox,
    timeout: Duration,
}

impl<'a> Shell<'a> {
    pub fn new(sandbox: &'a dyn Sandbox, timeout: Duration) -> Self {
        Self { sandbox, timeout }
    }

    /// Runs `command`, failing with a timeout error if it takes too long.
    pub async fn run(&self, command: &str) -> Result<CommandOutput, SandboxError> {
        debug!("Running: {}", command);
        match tokio::time::timeout(self.timeout, self.sandbox.run_command(command)).await {
            Ok(result) => result,
            Err(_) => Err(SandboxError::timeout(command, self.timeout)),
        }
    }

    /// Runs `command` and ignores the outcome.
    pub async fn run_best_effort(&self, command: &str) {
        if let Err(e) = self.run(command).await {
            debug!("Ignoring failure of '{}': {}", command, e);
        }
    }

    /// App directory, chosen by the sandbox provider.
    ///
    /// Falls back to the default layout when metadata is unavailable.
    pub fn work_dir(&self) -> Result<&'static str, SandboxError> {
        let provider = self
            .sandbox
            .info()?
            .map(|info| info.provider)
            .unwrap_or_default();
        Ok(provider.work_dir())
    }
}
