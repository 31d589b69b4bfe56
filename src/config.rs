use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sandbox::{ProviderKind, SandboxInfo};

const CONFIG_FILE: &str = "sandbox-keeper.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// How the sandbox is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// No sandbox; every endpoint answers 404
    #[default]
    None,
    /// A running Docker container
    Docker,
    /// The machine the keeper runs on
    Local,
}

/// Sandbox configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Which adapter to use
    #[serde(default)]
    pub backend: Backend,

    /// Container name or id (docker backend)
    #[serde(default)]
    pub container: Option<String>,

    /// Identifier reported back to callers
    /// - Default: the container name, or "local"
    #[serde(default)]
    pub sandbox_id: Option<String>,

    /// Public URL of the dev server, used for keepalive traffic
    #[serde(default)]
    pub url: Option<String>,

    /// Hosting provider; decides the app directory
    #[serde(default)]
    pub provider: ProviderKind,
}

impl SandboxConfig {
    /// Builds the sandbox metadata, falling back to `default_id`.
    pub(crate) fn info(&self, default_id: &str) -> SandboxInfo {
        SandboxInfo {
            sandbox_id: self
                .sandbox_id
                .clone()
                .unwrap_or_else(|| default_id.to_string()),
            url: self.url.clone().filter(|url| !url.is_empty()),
            provider: self.provider,
        }
    }
}

/// Dev-server recovery timings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Readiness checks after a restart
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    /// Pause between readiness checks
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause after launching the dev server, before the first check
    #[serde(default = "default_launch_settle_ms")]
    pub launch_settle_ms: u64,

    /// Upper bound for any single sandbox command
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Upper bound for the keepalive HTTP request
    #[serde(default = "default_traffic_timeout_secs")]
    pub traffic_timeout_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            poll_attempts: default_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            launch_settle_ms: default_launch_settle_ms(),
            command_timeout_secs: default_command_timeout_secs(),
            traffic_timeout_secs: default_traffic_timeout_secs(),
        }
    }
}

impl RecoveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn launch_settle(&self) -> Duration {
        Duration::from_millis(self.launch_settle_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn traffic_timeout(&self) -> Duration {
        Duration::from_secs(self.traffic_timeout_secs)
    }

    /// Rejects settings that would make every sandbox command or restart fail.
    pub fn validate(&self) -> Result<()> {
        let zeroed = [
            ("poll_attempts", u64::from(self.poll_attempts)),
            ("command_timeout_secs", self.command_timeout_secs),
            ("traffic_timeout_secs", self.traffic_timeout_secs),
        ];
        for (key, value) in zeroed {
            if value == 0 {
                bail!("recovery.{key} must be greater than 0");
            }
        }
        Ok(())
    }

    /// No pauses, for tests.
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            poll_interval_ms: 0,
            launch_settle_ms: 0,
            command_timeout_secs: 5,
            traffic_timeout_secs: 1,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files (stderr only when unset)
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

// Default value functions
fn default_bind() -> String {
    "127.0.0.1:3001".to_string()
}

fn default_poll_attempts() -> u32 {
    10
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_launch_settle_ms() -> u64 {
    3000
}

fn default_command_timeout_secs() -> u64 {
    30
}

fn default_traffic_timeout_secs() -> u64 {
    5
}

impl Config {
    /// Load configuration from `sandbox-keeper.toml` in `dir`, using defaults if not found
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .recovery
            .validate()
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        Ok(config)
    }

    /// Resolve the configuration for this run.
    ///
    /// An explicit path must exist. Otherwise the working directory is
    /// searched first, then the user config directory.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            return Self::load_from(path);
        }

        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        if cwd.join(CONFIG_FILE).exists() {
            return Self::load(&cwd);
        }

        match user_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// `<config dir>/sandbox-keeper/config.toml`
fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sandbox-keeper").join("config.toml"))
}
