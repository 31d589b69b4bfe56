//! Domain-specific error types for sandbox operations.
//!
//! Typed errors enable callers to match on specific failure modes
//! rather than parsing error message strings. The one exception is
//! [`SandboxError::is_critical`], which has to classify messages that
//! originate from remote providers we do not control.

use std::time::Duration;

/// Message fragments meaning the sandbox itself is gone, not just the dev server.
pub(crate) const CRITICAL_MARKERS: [&str; 3] = ["No active sandbox", "terminated", "stopped"];

/// Errors that can occur while talking to a sandbox.
#[derive(Debug, thiserror::Error)]
pub(crate) enum SandboxError {
    /// Docker daemon is not running or not accessible.
    #[error("Docker is not available: {message}")]
    DockerUnavailable { message: String },

    /// The sandbox no longer exists on the provider side.
    #[error("No active sandbox: {message}")]
    NotFound { message: String },

    /// The sandbox exists but is not running.
    #[error("Sandbox stopped: {message}")]
    Stopped { message: String },

    /// A single command exceeded the per-call timeout.
    #[error("Command timed out after {timeout_ms} ms: {command}")]
    Timeout { command: String, timeout_ms: u64 },

    /// A command could not be executed (spawn, exec or transport failure).
    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    /// Any other error reported by the provider, passed through verbatim.
    #[error("{message}")]
    Provider { message: String },
}

impl SandboxError {
    /// Creates a `DockerUnavailable` error.
    pub fn docker_unavailable(message: impl Into<String>) -> Self {
        Self::DockerUnavailable {
            message: message.into(),
        }
    }

    /// Creates a `NotFound` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a `Stopped` error.
    pub fn stopped(message: impl Into<String>) -> Self {
        Self::Stopped {
            message: message.into(),
        }
    }

    /// Creates a `Timeout` error for `command` from a `Duration`.
    pub fn timeout(command: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            command: command.into(),
            timeout_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Creates a `CommandFailed` error.
    pub fn command_failed(message: impl Into<String>) -> Self {
        Self::CommandFailed {
            message: message.into(),
        }
    }

    /// Creates a `Provider` error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Returns true if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true when the message says the sandbox itself is gone.
    ///
    /// Only these errors justify asking the caller to provision a new
    /// sandbox; everything else is retried on the next keepalive.
    pub fn is_critical(&self) -> bool {
        let message = self.to_string();
        CRITICAL_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
    }
}
