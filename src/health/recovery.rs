//! Dev-server recovery.
//!
//! One keepalive run checks that the dev server process is alive, restarts
//! it if not, waits a bounded number of polls for it to announce readiness,
//! and finally sends traffic to the sandbox's public URL. Runs share no
//! state; every decision comes from what this run observed.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::probe::check_process;
use super::shell;
use super::traffic::TrafficGenerator;
use super::Shell;
use crate::config::RecoveryConfig;
use crate::sandbox::{Presence, Sandbox, SandboxError, SandboxInfo};

/// Log lines inspected on each readiness poll.
const POLL_TAIL_LINES: u32 = 20;

/// Log lines attached to an outcome whose restart never became ready.
const DIAGNOSTIC_TAIL_LINES: u32 = 50;

/// Why a keepalive run could not complete.
#[derive(Debug, Error)]
pub(crate) enum KeepaliveError {
    /// The provider had no metadata this time; a later run may succeed.
    #[error("Sandbox info unavailable")]
    MetadataUnavailable,

    #[error("{0}")]
    Health(#[from] SandboxError),
}

impl KeepaliveError {
    /// Whether the sandbox is gone for good and must be reprovisioned.
    pub fn should_recreate(&self) -> bool {
        match self {
            Self::MetadataUnavailable => false,
            Self::Health(e) => e.is_critical(),
        }
    }
}

/// Result of a completed keepalive run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecoveryOutcome {
    pub success: bool,
    pub message: String,
    pub sandbox_id: String,
    pub vite_running: bool,
    /// Whether this run launched the dev server.
    pub restarted: bool,
    /// Readiness polls made after the restart.
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_recreate: Option<bool>,
    /// Tail of the dev server log when the restart did not become ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollResult {
    /// The log announced a listening address.
    Ready { attempts: u32 },
    /// The log reported a fatal error; polling stopped early.
    Failed { attempts: u32 },
    /// No signal within the attempt budget.
    Exhausted { attempts: u32 },
}

/// Keeps the dev server inside a sandbox alive.
#[derive(Debug, Clone)]
pub(crate) struct RecoveryController {
    config: RecoveryConfig,
    traffic: TrafficGenerator,
}

impl RecoveryController {
    pub fn new(config: RecoveryConfig) -> Result<Self> {
        let traffic = TrafficGenerator::new(config.traffic_timeout())?;
        Ok(Self { config, traffic })
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Runs one keepalive pass against `sandbox`.
    pub async fn keepalive(
        &self,
        sandbox: &dyn Sandbox,
    ) -> Result<RecoveryOutcome, KeepaliveError> {
        let info = sandbox.info()?.ok_or(KeepaliveError::MetadataUnavailable)?;
        let shell = Shell::new(sandbox, self.config.command_timeout());

        debug!("Checking dev server in sandbox {}", info.sandbox_id);
        let process = check_process(&shell).await?;

        let outcome = if process.running {
            debug!("Dev server is running in sandbox {}", info.sandbox_id);
            RecoveryOutcome {
                success: true,
                message: "Sandbox and dev server are healthy".to_string(),
                sandbox_id: info.sandbox_id.clone(),
                vite_running: true,
                restarted: false,
                attempts: 0,
                should_recreate: None,
                diagnostics: None,
                timestamp: Utc::now(),
            }
        } else {
            self.restart(&shell, &info).await?
        };

        if let Some(url) = &info.url {
            if !self.traffic.ping(url).await {
                warn!("Keepalive traffic to {} got no response", url);
            }
        }

        Ok(outcome)
    }

    async fn restart(
        &self,
        shell: &Shell<'_>,
        info: &SandboxInfo,
    ) -> Result<RecoveryOutcome, KeepaliveError> {
        warn!(
            "Dev server not running in sandbox {}, restarting",
            info.sandbox_id
        );

        shell.run_best_effort(&shell::kill_dev_server()).await;
        shell.run_best_effort(&shell::reset_logs()).await;
        shell
            .run(&shell::launch_dev_server(info.provider.work_dir()))
            .await?;

        tokio::time::sleep(self.config.launch_settle()).await;

        let poll = self.poll_ready(shell).await;
        let outcome = match poll {
            PollResult::Ready { attempts } => {
                info!(
                    "Dev server ready in sandbox {} after {} poll(s)",
                    info.sandbox_id, attempts
                );
                RecoveryOutcome {
                    success: true,
                    message: "Dev server restarted".to_string(),
                    sandbox_id: info.sandbox_id.clone(),
                    vite_running: true,
                    restarted: true,
                    attempts,
                    should_recreate: None,
                    diagnostics: None,
                    timestamp: Utc::now(),
                }
            }
            PollResult::Failed { attempts } | PollResult::Exhausted { attempts } => {
                let message = if matches!(poll, PollResult::Failed { .. }) {
                    "Dev server restart failed; see diagnostics"
                } else {
                    "Dev server restarted but did not report ready"
                };
                warn!("{} (sandbox {})", message, info.sandbox_id);
                let diagnostics = shell
                    .run(&shell::tail_logs(DIAGNOSTIC_TAIL_LINES))
                    .await
                    .map(|output| output.stdout)
                    .unwrap_or_else(|e| {
                        debug!("Could not read dev server log: {}", e);
                        String::new()
                    });
                RecoveryOutcome {
                    success: true,
                    message: message.to_string(),
                    sandbox_id: info.sandbox_id.clone(),
                    vite_running: false,
                    restarted: true,
                    attempts,
                    should_recreate: Some(false),
                    diagnostics: Some(diagnostics),
                    timestamp: Utc::now(),
                }
            }
        };

        Ok(outcome)
    }

    /// Polls until the log shows a ready or error marker, or attempts run out.
    ///
    /// A failing poll command counts as "not ready yet".
    async fn poll_ready(&self, shell: &Shell<'_>) -> PollResult {
        let max_attempts = self.config.poll_attempts;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.poll_interval()).await;
            }
            debug!("Readiness poll {}/{}", attempt, max_attempts);

            let running = match shell.run(&shell::process_check()).await {
                Ok(output) => Presence::parse(&output, shell::NOT_RUNNING).is_present(),
                Err(e) => {
                    debug!("Process check failed: {}", e);
                    false
                }
            };
            if !running {
                continue;
            }

            let logs = match shell.run(&shell::tail_logs(POLL_TAIL_LINES)).await {
                Ok(output) => output.stdout,
                Err(e) => {
                    debug!("Log tail failed: {}", e);
                    continue;
                }
            };
            if shell::has_error_marker(&logs) {
                return PollResult::Failed { attempts: attempt };
            }
            if shell::has_ready_marker(&logs) {
                return PollResult::Ready { attempts: attempt };
            }
        }

        PollResult::Exhausted {
            attempts: max_attempts,
        }
    }
}
