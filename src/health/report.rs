//! Recommendations and JSON response bodies.

use serde::Serialize;
use serde_json::{json, Value};

use super::probe::{Check, Checks, DiagnosticReport};
use super::recovery::{KeepaliveError, RecoveryOutcome};

/// A fixed remediation hint. Serializes as its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) enum Recommendation {
    #[serde(rename = "Vite process is not running. Use /api/sandbox-keepalive to restart it.")]
    RestartDevServer,
    #[serde(rename = "Vite logs contain errors. Check the viteLogs field for details.")]
    InspectLogs,
    #[serde(rename = "Port 5173 is in use but Vite is not running. Kill the process using the port.")]
    FreePort,
    #[serde(rename = "package.json is missing. Recreate the sandbox.")]
    MissingManifest,
    #[serde(rename = "package.json is invalid. Recreate the sandbox.")]
    InvalidManifest,
    #[serde(rename = "node_modules is missing. Run npm install.")]
    MissingDependencies,
}

impl Recommendation {
    pub fn message(self) -> &'static str {
        match self {
            Self::RestartDevServer => {
                "Vite process is not running. Use /api/sandbox-keepalive to restart it."
            }
            Self::InspectLogs => "Vite logs contain errors. Check the viteLogs field for details.",
            Self::FreePort => {
                "Port 5173 is in use but Vite is not running. Kill the process using the port."
            }
            Self::MissingManifest => "package.json is missing. Recreate the sandbox.",
            Self::InvalidManifest => "package.json is invalid. Recreate the sandbox.",
            Self::MissingDependencies => "node_modules is missing. Run npm install.",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Evaluates every rule independently, in a fixed order.
///
/// A probe that errored is not confirmed healthy, so "running", "exists"
/// and "valid" rules fire on it. Rules that need a positive observation
/// (errors in the logs, a bound port) only fire on actual data.
pub(crate) fn recommend(checks: &Checks) -> Vec<Recommendation> {
    let running = checks.vite_process.ok().is_some_and(|p| p.running);
    let logs_have_errors = checks.vite_logs.ok().is_some_and(|l| l.has_errors);
    let port_in_use = checks.port.ok().is_some_and(|p| p.in_use);
    let manifest_exists = checks.package_json.ok().is_some_and(|p| p.exists);
    let manifest_invalid = match &checks.package_json_content {
        None => false,
        Some(Check::Ok(content)) => !content.valid,
        Some(Check::Failed { .. }) => true,
    };
    let node_modules_exist = checks.node_modules.ok().is_some_and(|p| p.exists);

    let rules = [
        (!running, Recommendation::RestartDevServer),
        (logs_have_errors, Recommendation::InspectLogs),
        (port_in_use && !running, Recommendation::FreePort),
        (!manifest_exists, Recommendation::MissingManifest),
        (manifest_invalid, Recommendation::InvalidManifest),
        (!node_modules_exist, Recommendation::MissingDependencies),
    ];

    rules
        .into_iter()
        .filter_map(|(fires, recommendation)| fires.then_some(recommendation))
        .collect()
}

/// `{success: true, diagnostics}`
pub(crate) fn diagnostics_body(report: &DiagnosticReport) -> Result<Value, serde_json::Error> {
    Ok(json!({
        "success": true,
        "diagnostics": serde_json::to_value(report)?,
    }))
}

/// The recovery outcome, as returned to the caller.
pub(crate) fn keepalive_body(outcome: &RecoveryOutcome) -> Result<Value, serde_json::Error> {
    serde_json::to_value(outcome)
}

pub(crate) fn no_sandbox_diagnostics_body() -> Value {
    json!({
        "success": false,
        "error": "No active sandbox",
    })
}

pub(crate) fn no_sandbox_keepalive_body() -> Value {
    json!({
        "success": false,
        "message": "No active sandbox to keep alive",
    })
}

/// Body for a keepalive that could not complete.
pub(crate) fn keepalive_failure_body(error: &KeepaliveError) -> Value {
    match error {
        KeepaliveError::MetadataUnavailable => json!({
            "success": false,
            "message": "Sandbox info unavailable",
            "shouldRecreate": false,
        }),
        KeepaliveError::Health(_) => {
            let should_recreate = error.should_recreate();
            let message = if should_recreate {
                "Sandbox unhealthy"
            } else {
                "Sandbox health check failed"
            };
            json!({
                "success": false,
                "message": message,
                "error": error.to_string(),
                "shouldRecreate": should_recreate,
            })
        }
    }
}

/// Body for an unexpected failure.
pub(crate) fn internal_error_body(error: &str) -> Value {
    json!({
        "success": false,
        "error": error,
    })
}
