//! Host shell adapter, for when the keeper runs inside the sandbox itself.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{CommandOutput, Sandbox, SandboxError, SandboxInfo};

/// Runs commands with `sh -c` on the local machine.
#[derive(Debug, Clone)]
pub(crate) struct LocalSandbox {
    info: SandboxInfo,
}

impl LocalSandbox {
    pub fn new(info: SandboxInfo) -> Self {
        Self { info }
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    fn info(&self) -> Result<Option<SandboxInfo>, SandboxError> {
        Ok(Some(self.info.clone()))
    }

    async fn run_command(&self, command: &str) -> Result<CommandOutput, SandboxError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SandboxError::command_failed(format!("failed to spawn sh: {e}")))?;

        if !output.stderr.is_empty() {
            debug!("stderr: {}", String::from_utf8_lossy(&output.stderr).trim());
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            exit_code: output.status.code().map(i64::from),
        })
    }
}
