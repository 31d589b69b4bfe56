//! Keep the configured sandbox's dev server alive.
//!
//! Runs the recovery controller once, or on a fixed interval with `--every`.
//! Each run is independent. A sandbox that must be recreated always ends
//! the command with an error.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::fmt::Write;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::config::Config;
use crate::health::recovery::{KeepaliveError, RecoveryController, RecoveryOutcome};
use crate::health::report;
use crate::sandbox::Sandbox;

/// Format a completed run as a displayable string
pub fn format_outcome(outcome: &RecoveryOutcome) -> String {
    let mut out = String::new();
    let mark = if outcome.vite_running {
        "✓".green()
    } else {
        "⚠".yellow()
    };
    let _ = writeln!(out, "{} {}", mark, outcome.message);
    let _ = writeln!(out, "  Sandbox:     {}", outcome.sandbox_id.cyan());
    let _ = writeln!(
        out,
        "  Dev server:  {}",
        if outcome.vite_running {
            "running".green()
        } else {
            "not running".red()
        }
    );
    if outcome.restarted {
        let _ = writeln!(
            out,
            "  Restarted:   after {} readiness poll(s)",
            outcome.attempts.to_string().cyan()
        );
    }
    if let Some(diagnostics) = outcome.diagnostics.as_deref().filter(|d| !d.trim().is_empty()) {
        let _ = writeln!(out, "  Last log lines:");
        for log_line in diagnostics.lines() {
            let _ = writeln!(out, "    {}", log_line.dimmed());
        }
    }
    out
}

/// Format a failed run as a displayable string
pub fn format_failure(error: &KeepaliveError) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} Keepalive failed: {}", "✗".red(), error);
    if error.should_recreate() {
        let _ = writeln!(out, "  The sandbox must be recreated.");
    }
    out
}

/// Renders one run as JSON or terminal text.
pub fn render(result: &Result<RecoveryOutcome, KeepaliveError>, json: bool) -> Result<String> {
    if !json {
        return Ok(match result {
            Ok(outcome) => format_outcome(outcome),
            Err(e) => format_failure(e),
        });
    }

    let body = match result {
        Ok(outcome) => report::keepalive_body(outcome).context("Failed to serialize outcome")?,
        Err(e) => report::keepalive_failure_body(e),
    };
    let mut text = serde_json::to_string_pretty(&body).context("Failed to serialize outcome")?;
    text.push('\n');
    Ok(text)
}

/// Runs one keepalive pass and prints the result.
///
/// With `tolerate_transient`, failures that a later run may fix are logged
/// instead of returned.
async fn run_once(
    controller: &RecoveryController,
    sandbox: &dyn Sandbox,
    json: bool,
    tolerate_transient: bool,
) -> Result<()> {
    let result = controller.keepalive(sandbox).await;
    print!("{}", render(&result, json)?);

    match result {
        Ok(_) => Ok(()),
        Err(e) if e.should_recreate() => bail!("Sandbox must be recreated: {e}"),
        Err(e) if tolerate_transient => {
            warn!("Keepalive failed, will retry: {}", e);
            Ok(())
        }
        Err(e) => bail!("Keepalive failed: {e}"),
    }
}

/// Entry point: keeps the configured sandbox alive
pub async fn run(config: &Config, json: bool, every: Option<u64>) -> Result<()> {
    let sandbox = super::require_sandbox(&config.sandbox).await?;
    let controller = RecoveryController::new(config.recovery.clone())?;

    let Some(secs) = every else {
        return run_once(&controller, sandbox.as_ref(), json, false).await;
    };

    let period = Duration::from_secs(secs.max(1));
    info!("Running keepalive every {}s", period.as_secs());
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_once(&controller, sandbox.as_ref(), json, true).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping keepalive loop");
                return Ok(());
            }
        }
    }
}
