//! Read-only diagnostics of the dev server inside a sandbox.
//!
//! Six independent probes run in a fixed order. A probe that fails records
//! `{error}` for itself only; the other probes still run. Nothing here
//! changes sandbox state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::report::{recommend, Recommendation};
use super::shell;
use super::Shell;
use crate::sandbox::{Presence, Sandbox, SandboxError};

/// Characters of `lsof` output kept in the port check.
const PORT_DETAILS_LIMIT: usize = 200;

/// Log lines read by the log check.
const LOG_TAIL_LINES: u32 = 50;

/// Result of one probe: its data, or why it could not run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub(crate) enum Check<T> {
    Ok(T),
    Failed { error: String },
}

impl<T> Check<T> {
    fn from_result(result: Result<T, SandboxError>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(e) => Self::Failed {
                error: e.to_string(),
            },
        }
    }

    /// The probe data, if the probe ran.
    pub fn ok(&self) -> Option<&T> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Failed { .. } => None,
        }
    }

    #[cfg(test)]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Failed { error } => Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ProcessStatus {
    pub running: bool,
    /// Raw `pgrep` output when the process was found.
    pub pid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LogStatus {
    pub logs: String,
    pub has_errors: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PortStatus {
    pub in_use: bool,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct PathStatus {
    pub exists: bool,
    pub path: String,
}

/// What `package.json` declares.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ManifestContent {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_vite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_react: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripts: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ManifestContent {
    /// Parses manifest text. Malformed JSON is reported, never raised.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(manifest) => Self {
                valid: true,
                has_vite: Some(is_truthy(
                    manifest.pointer("/devDependencies/vite"),
                )),
                has_react: Some(is_truthy(manifest.pointer("/dependencies/react"))),
                scripts: Some(
                    manifest
                        .get("scripts")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default(),
                ),
                error: None,
            },
            Err(e) => {
                debug!("package.json does not parse: {}", e);
                Self {
                    valid: false,
                    has_vite: None,
                    has_react: None,
                    scripts: None,
                    error: Some("Invalid JSON".to_string()),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct DiskStatus {
    /// Last line of `df -h /`.
    pub usage: String,
}

/// Per-probe results, keyed as in the HTTP payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Checks {
    pub vite_process: Check<ProcessStatus>,
    pub vite_logs: Check<LogStatus>,
    #[serde(rename = "port5173")]
    pub port: Check<PortStatus>,
    pub package_json: Check<PathStatus>,
    /// Absent when the manifest does not exist or could not be checked.
    pub package_json_content: Option<Check<ManifestContent>>,
    pub node_modules: Check<PathStatus>,
    pub disk_space: Check<DiskStatus>,
}

/// A full diagnostic pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct DiagnosticReport {
    pub timestamp: DateTime<Utc>,
    pub checks: Checks,
    pub recommendations: Vec<Recommendation>,
}

/// Runs every probe against `sandbox` and derives recommendations.
pub(crate) async fn diagnose(sandbox: &dyn Sandbox, command_timeout: Duration) -> DiagnosticReport {
    let shell = Shell::new(sandbox, command_timeout);

    let vite_process = Check::from_result(check_process(&shell).await);
    let vite_logs = Check::from_result(check_logs(&shell).await);
    let port = Check::from_result(check_port(&shell).await);
    let (package_json, package_json_content) = check_manifest(&shell).await;
    let node_modules = Check::from_result(check_node_modules(&shell).await);
    let disk_space = Check::from_result(check_disk(&shell).await);

    let checks = Checks {
        vite_process,
        vite_logs,
        port,
        package_json,
        package_json_content,
        node_modules,
        disk_space,
    };
    let recommendations = recommend(&checks);

    info!(
        "Diagnostics complete: {} recommendation(s)",
        recommendations.len()
    );

    DiagnosticReport {
        timestamp: Utc::now(),
        checks,
        recommendations,
    }
}

/// Whether the dev server process is alive.
pub(crate) async fn check_process(shell: &Shell<'_>) -> Result<ProcessStatus, SandboxError> {
    let output = shell.run(&shell::process_check()).await?;
    let presence = Presence::parse(&output, shell::NOT_RUNNING);
    Ok(ProcessStatus {
        running: presence.is_present(),
        pid: presence.detail().map(str::to_string),
    })
}

async fn check_logs(shell: &Shell<'_>) -> Result<LogStatus, SandboxError> {
    let output = shell.run(&shell::tail_logs(LOG_TAIL_LINES)).await?;
    let has_errors = shell::has_error_marker(&output.stdout);
    Ok(LogStatus {
        logs: output.stdout,
        has_errors,
    })
}

async fn check_port(shell: &Shell<'_>) -> Result<PortStatus, SandboxError> {
    let output = shell.run(&shell::port_check()).await?;
    // Only the fallback sentinel proves the port free; silent output counts as in use.
    let in_use = !output.stdout.contains(shell::PORT_FREE);
    Ok(PortStatus {
        in_use,
        details: output.stdout.chars().take(PORT_DETAILS_LIMIT).collect(),
    })
}

async fn check_manifest(
    shell: &Shell<'_>,
) -> (Check<PathStatus>, Option<Check<ManifestContent>>) {
    let work_dir = match shell.work_dir() {
        Ok(dir) => dir,
        Err(e) => return (Check::from_result(Err(e)), None),
    };
    let path = format!("{work_dir}/package.json");

    let exists = match shell.run(&shell::file_exists(&path)).await {
        Ok(output) => Presence::parse(&output, shell::MISSING).is_present(),
        Err(e) => return (Check::from_result(Err(e)), None),
    };

    let content = if exists {
        let read = shell.run(&shell::read_file(&path)).await;
        Some(Check::from_result(
            read.map(|output| ManifestContent::parse(&output.stdout)),
        ))
    } else {
        None
    };

    (Check::Ok(PathStatus { exists, path }), content)
}

async fn check_node_modules(shell: &Shell<'_>) -> Result<PathStatus, SandboxError> {
    let path = format!("{}/node_modules", shell.work_dir()?);
    let output = shell.run(&shell::dir_exists(&path)).await?;
    Ok(PathStatus {
        exists: Presence::parse(&output, shell::MISSING).is_present(),
        path,
    })
}

async fn check_disk(shell: &Shell<'_>) -> Result<DiskStatus, SandboxError> {
    let output = shell.run(&shell::disk_usage()).await?;
    Ok(DiskStatus {
        usage: output.stdout.trim().to_string(),
    })
}

/// JSON truthiness: `null`, `false`, `0` and `""` are falsy.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}
