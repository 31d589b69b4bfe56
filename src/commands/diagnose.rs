//! Run the health probes once and print the report.
//!
//! Formatting is pure. IO happens only at the top level.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fmt::Write;

use crate::config::Config;
use crate::health::probe::{self, Check, DiagnosticReport};

/// One report line: a mark, a label and a value.
fn line(out: &mut String, healthy: bool, label: &str, value: &str) {
    let mark = if healthy { "✓".green() } else { "✗".red() };
    let _ = writeln!(out, "  {} {:<14} {}", mark, label, value);
}

fn failed(out: &mut String, label: &str, error: &str) {
    let _ = writeln!(out, "  {} {:<14} {}", "!".yellow(), label, error.red());
}

/// Format a diagnostic report as a displayable string
pub fn format_report(report: &DiagnosticReport) -> String {
    let checks = &report.checks;
    let mut out = String::new();

    let _ = writeln!(out, "\n{}", "━".repeat(50).dimmed());
    let _ = writeln!(out, "{}", "   🩺 Dev Server Diagnostics".yellow().bold());
    let _ = writeln!(out, "{}", "━".repeat(50).dimmed());

    match &checks.vite_process {
        Check::Ok(process) => match &process.pid {
            Some(pid) if process.running => {
                let pids = pid.replace('\n', ", ");
                line(&mut out, true, "Dev server", &format!("running (pid {pids})"));
            }
            _ => line(&mut out, false, "Dev server", "not running"),
        },
        Check::Failed { error } => failed(&mut out, "Dev server", error),
    }

    match &checks.vite_logs {
        Check::Ok(logs) if logs.has_errors => line(&mut out, false, "Logs", "contain errors"),
        Check::Ok(_) => line(&mut out, true, "Logs", "clean"),
        Check::Failed { error } => failed(&mut out, "Logs", error),
    }

    match &checks.port {
        Check::Ok(port) if port.in_use => line(&mut out, true, "Port 5173", "in use"),
        Check::Ok(_) => line(&mut out, false, "Port 5173", "free"),
        Check::Failed { error } => failed(&mut out, "Port 5173", error),
    }

    match (&checks.package_json, &checks.package_json_content) {
        (Check::Failed { error }, _) => failed(&mut out, "package.json", error),
        (Check::Ok(manifest), _) if !manifest.exists => {
            line(&mut out, false, "package.json", &format!("missing ({})", manifest.path));
        }
        (Check::Ok(_), Some(Check::Failed { error })) => {
            failed(&mut out, "package.json", error);
        }
        (Check::Ok(manifest), Some(Check::Ok(content))) if !content.valid => {
            line(&mut out, false, "package.json", &format!("invalid ({})", manifest.path));
        }
        (Check::Ok(manifest), _) => line(&mut out, true, "package.json", &manifest.path),
    }

    match &checks.node_modules {
        Check::Ok(modules) if modules.exists => {
            line(&mut out, true, "node_modules", &modules.path);
        }
        Check::Ok(modules) => {
            line(&mut out, false, "node_modules", &format!("missing ({})", modules.path));
        }
        Check::Failed { error } => failed(&mut out, "node_modules", error),
    }

    match &checks.disk_space {
        Check::Ok(disk) => {
            let _ = writeln!(out, "  {} {:<14} {}", "ℹ".blue(), "Disk", disk.usage.dimmed());
        }
        Check::Failed { error } => failed(&mut out, "Disk", error),
    }

    let _ = writeln!(out, "{}", "━".repeat(50).dimmed());

    if report.recommendations.is_empty() {
        let _ = writeln!(out, "{} No problems found.", "✓".green());
    } else {
        let _ = writeln!(out, "{}", "Recommendations:".bold());
        for recommendation in &report.recommendations {
            let _ = writeln!(out, "  {} {}", "→".cyan(), recommendation);
        }
    }

    out
}

/// Entry point: diagnoses the configured sandbox
pub async fn run(config: &Config, json: bool) -> Result<()> {
    let sandbox = super::require_sandbox(&config.sandbox).await?;
    let report = probe::diagnose(sandbox.as_ref(), config.recovery.command_timeout()).await;

    if json {
        let text =
            serde_json::to_string_pretty(&report).context("Failed to serialize diagnostics")?;
        println!("{text}");
    } else {
        print!("{}", format_report(&report));
    }
    Ok(())
}
