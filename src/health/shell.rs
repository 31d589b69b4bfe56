//! Shell commands sent to the sandbox, and the markers read back from them.
//!
//! Probe commands print a sentinel on their fallback branch; see
//! [`crate::sandbox::Presence`].

use std::borrow::Cow;

/// Port the dev server binds inside the sandbox.
pub(crate) const DEV_SERVER_PORT: u16 = 5173;

/// Combined stdout/stderr of the dev server.
pub(crate) const LOG_FILE: &str = "/tmp/vite.log";

pub(crate) const NOT_RUNNING: &str = "not_running";
pub(crate) const NO_LOGS: &str = "no logs";
pub(crate) const PORT_FREE: &str = "port_free";
pub(crate) const MISSING: &str = "missing";

/// Log fragments meaning the dev server hit a fatal problem.
pub(crate) const ERROR_MARKERS: [&str; 3] = ["error", "Error", "EADDRINUSE"];

/// Log fragments meaning the dev server announced its listening address.
pub(crate) const READY_MARKERS: [&str; 3] = ["Local:", "ready in", "localhost:5173"];

// `[v]ite` matches "vite" but not the `sh -c` wrapper whose own command
// line contains the pattern.
pub(crate) fn process_check() -> String {
    format!(r#"pgrep -f "[v]ite" || echo "{NOT_RUNNING}""#)
}

pub(crate) fn kill_dev_server() -> String {
    r#"pkill -9 -f "[v]ite" || true"#.to_string()
}

pub(crate) fn tail_logs(lines: u32) -> String {
    format!(r#"tail -n {lines} {LOG_FILE} 2>/dev/null || echo "{NO_LOGS}""#)
}

pub(crate) fn reset_logs() -> String {
    format!("rm -f {LOG_FILE} && touch {LOG_FILE}")
}

pub(crate) fn port_check() -> String {
    format!(r#"lsof -i :{DEV_SERVER_PORT} 2>/dev/null || echo "{PORT_FREE}""#)
}

pub(crate) fn file_exists(path: &str) -> String {
    format!(r#"test -f {} && echo "exists" || echo "{MISSING}""#, quote(path))
}

pub(crate) fn dir_exists(path: &str) -> String {
    format!(r#"test -d {} && echo "exists" || echo "{MISSING}""#, quote(path))
}

pub(crate) fn read_file(path: &str) -> String {
    format!("cat {}", quote(path))
}

pub(crate) fn disk_usage() -> String {
    "df -h / | tail -1".to_string()
}

/// Starts the dev server detached, logging into [`LOG_FILE`].
pub(crate) fn launch_dev_server(work_dir: &str) -> String {
    let script = format!(
        "cd {} && nohup npm run dev > {LOG_FILE} 2>&1 &",
        quote(work_dir)
    );
    format!("sh -c {}", quote(&script))
}

pub(crate) fn has_error_marker(logs: &str) -> bool {
    ERROR_MARKERS.iter().any(|marker| logs.contains(marker))
}

/// Ready markers only count at the start of a word, so "already in use"
/// does not read as "ready in".
pub(crate) fn has_ready_marker(logs: &str) -> bool {
    READY_MARKERS.iter().any(|marker| {
        logs.match_indices(marker).any(|(start, _)| {
            !logs[..start]
                .chars()
                .next_back()
                .is_some_and(char::is_alphanumeric)
        })
    })
}

fn quote(text: &str) -> Cow<'_, str> {
    shell_words::quote(text)
}
