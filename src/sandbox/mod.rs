//! Remote sandbox access.
//!
//! The keeper only ever talks to a sandbox through the [`Sandbox`] trait:
//! read its metadata, run a shell command, read the output. Concrete
//! providers (Docker, the local host) adapt to that shape at the boundary,
//! so the prober and the recovery controller never branch on provider.

mod docker;
mod error;
mod local;
mod presence;
mod registry;
#[cfg(test)]
pub(crate) mod scripted;

pub(crate) use docker::DockerSandbox;
pub(crate) use error::SandboxError;
pub(crate) use local::LocalSandbox;
pub(crate) use presence::Presence;
pub(crate) use registry::SessionRegistry;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::config::{Backend, SandboxConfig};

/// Working directory of the app inside Vercel sandboxes.
pub(crate) const VERCEL_WORK_DIR: &str = "/vercel/sandbox";

/// Working directory of the app inside every other sandbox.
pub(crate) const DEFAULT_WORK_DIR: &str = "/home/user/app";

/// Command execution capability of a remote sandbox.
#[async_trait]
pub(crate) trait Sandbox: Send + Sync {
    /// Returns the sandbox metadata.
    ///
    /// `Ok(None)` means the metadata is temporarily unavailable; an `Err`
    /// means the lookup itself failed.
    fn info(&self) -> Result<Option<SandboxInfo>, SandboxError>;

    /// Runs a shell command inside the sandbox and returns its output.
    async fn run_command(&self, command: &str) -> Result<CommandOutput, SandboxError>;
}

/// Metadata describing a sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SandboxInfo {
    pub sandbox_id: String,
    pub url: Option<String>,
    pub provider: ProviderKind,
}

/// Output of a single command, normalized across providers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CommandOutput {
    pub stdout: String,
    /// Exit status when the provider reports one.
    pub exit_code: Option<i64>,
}

#[cfg(test)]
impl CommandOutput {
    /// Output with no exit status attached.
    pub fn new(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            exit_code: None,
        }
    }

    /// Attaches an exit status.
    #[must_use]
    pub fn with_exit_code(mut self, code: i64) -> Self {
        self.exit_code = Some(code);
        self
    }
}

/// Sandbox hosting provider. Only used to locate the app directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// E2B sandboxes (and anything else laid out like them).
    #[default]
    E2b,
    /// Vercel sandboxes.
    Vercel,
}

impl ProviderKind {
    /// Directory holding `package.json` and `node_modules`.
    pub fn work_dir(self) -> &'static str {
        match self {
            Self::Vercel => VERCEL_WORK_DIR,
            Self::E2b => DEFAULT_WORK_DIR,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::E2b => write!(f, "e2b"),
            Self::Vercel => write!(f, "vercel"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "e2b" => Ok(Self::E2b),
            "vercel" => Ok(Self::Vercel),
            _ => anyhow::bail!("Unknown sandbox provider: '{s}'. Supported: e2b, vercel"),
        }
    }
}

/// Builds the sandbox described by the configuration, if any.
pub(crate) async fn connect(config: &SandboxConfig) -> Result<Option<Arc<dyn Sandbox>>> {
    match config.backend {
        Backend::None => Ok(None),
        Backend::Docker => {
            let container = config
                .container
                .clone()
                .context("sandbox.container is required for the docker backend")?;
            let info = config.info(&container);
            info!("Using Docker sandbox {}", container);
            let sandbox = DockerSandbox::connect(container, info)
                .await
                .context("Failed to connect to the Docker sandbox")?;
            Ok(Some(Arc::new(sandbox)))
        }
        Backend::Local => {
            info!("Using the local host as sandbox");
            Ok(Some(Arc::new(LocalSandbox::new(config.info("local")))))
        }
    }
}
