//! Scripted sandbox for testing.
//!
//! Answers commands from per-pattern reply scripts and records every
//! command it receives, so probe and recovery logic can be exercised
//! without a real container.

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

use super::{CommandOutput, ProviderKind, Sandbox, SandboxError, SandboxInfo};

/// A single scripted reply.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// Succeed with the given stdout.
    Output(String),
    /// Succeed with stdout and an explicit exit code.
    Exit(String, i64),
    /// Fail with a provider error carrying this message.
    Error(String),
    /// Never answer.
    Hang,
}

impl Reply {
    pub fn out(stdout: &str) -> Self {
        Self::Output(stdout.to_string())
    }

    pub fn error(message: &str) -> Self {
        Self::Error(message.to_string())
    }
}

/// What `info()` returns.
#[derive(Debug, Clone)]
enum InfoScript {
    Available(SandboxInfo),
    Unavailable,
    Failing(String),
}

#[derive(Debug)]
struct Script {
    pattern: String,
    replies: Vec<Reply>,
    served: usize,
}

/// A sandbox whose answers are scripted by the test.
///
/// The first script whose pattern is a substring of the command answers
/// it. Replies are served in order and the last one repeats. Commands no
/// script matches succeed with empty output.
#[derive(Debug)]
pub(crate) struct ScriptedSandbox {
    info: InfoScript,
    scripts: Mutex<Vec<Script>>,
    commands: Mutex<Vec<String>>,
}

impl ScriptedSandbox {
    /// Creates a sandbox with the given metadata and no scripts.
    pub fn new(info: SandboxInfo) -> Self {
        Self {
            info: InfoScript::Available(info),
            scripts: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Creates an E2B-style sandbox with the given id and no public URL.
    pub fn named(sandbox_id: &str) -> Self {
        Self::new(SandboxInfo {
            sandbox_id: sandbox_id.to_string(),
            url: None,
            provider: ProviderKind::E2b,
        })
    }

    /// Makes `info()` return `Ok(None)`.
    #[must_use]
    pub fn without_info(mut self) -> Self {
        self.info = InfoScript::Unavailable;
        self
    }

    /// Makes `info()` fail with `message`.
    #[must_use]
    pub fn with_info_error(mut self, message: &str) -> Self {
        self.info = InfoScript::Failing(message.to_string());
        self
    }

    /// Adds a reply script for commands containing `pattern`.
    #[must_use]
    pub fn on(self, pattern: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.lock_scripts().push(Script {
            pattern: pattern.to_string(),
            replies: replies.into_iter().collect(),
            served: 0,
        });
        self
    }

    /// Every command received so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of received commands containing `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.commands()
            .iter()
            .filter(|command| command.contains(pattern))
            .count()
    }

    fn lock_scripts(&self) -> std::sync::MutexGuard<'_, Vec<Script>> {
        self.scripts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_reply(&self, command: &str) -> Option<Reply> {
        let mut scripts = self.lock_scripts();
        let script = scripts
            .iter_mut()
            .find(|script| command.contains(&script.pattern))?;
        let index = script.served.min(script.replies.len().saturating_sub(1));
        script.served += 1;
        script.replies.get(index).cloned()
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    fn info(&self) -> Result<Option<SandboxInfo>, SandboxError> {
        match &self.info {
            InfoScript::Available(info) => Ok(Some(info.clone())),
            InfoScript::Unavailable => Ok(None),
            InfoScript::Failing(message) => Err(SandboxError::provider(message.clone())),
        }
    }

    async fn run_command(&self, command: &str) -> Result<CommandOutput, SandboxError> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.to_string());

        match self.next_reply(command) {
            None => Ok(CommandOutput::new("").with_exit_code(0)),
            Some(Reply::Output(stdout)) => Ok(CommandOutput::new(stdout).with_exit_code(0)),
            Some(Reply::Exit(stdout, code)) => Ok(CommandOutput::new(stdout).with_exit_code(code)),
            Some(Reply::Error(message)) => Err(SandboxError::provider(message)),
            Some(Reply::Hang) => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order_then_repeat_last() {
        let sandbox = ScriptedSandbox::named("sbx")
            .on("pgrep", [Reply::out("not_running"), Reply::out("42")]);

        let first = sandbox.run_command("pgrep -f vite").await.unwrap();
        let second = sandbox.run_command("pgrep -f vite").await.unwrap();
        let third = sandbox.run_command("pgrep -f vite").await.unwrap();

        assert_eq!(first.stdout, "not_running");
        assert_eq!(second.stdout, "42");
        assert_eq!(third.stdout, "42");
    }

    #[tokio::test]
    async fn test_unmatched_command_is_empty_success() {
        let sandbox = ScriptedSandbox::named("sbx");
        let output = sandbox.run_command("true").await.unwrap();
        assert!(output.stdout.is_empty());
        assert_eq!(output.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_error_reply() {
        let sandbox = ScriptedSandbox::named("sbx").on("df", [Reply::error("boom")]);
        let err = sandbox.run_command("df -h /").await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_records_commands() {
        let sandbox = ScriptedSandbox::named("sbx");
        let _ = sandbox.run_command("pgrep -f vite").await;
        let _ = sandbox.run_command("df -h /").await;
        let _ = sandbox.run_command("pgrep -f vite").await;

        assert_eq!(sandbox.commands().len(), 3);
        assert_eq!(sandbox.count("pgrep"), 2);
    }

    #[test]
    fn test_info_variants() {
        assert!(ScriptedSandbox::named("a").info().unwrap().is_some());
        assert!(ScriptedSandbox::named("a").without_info().info().unwrap().is_none());
        let err = ScriptedSandbox::named("a")
            .with_info_error("Sandbox terminated")
            .info()
            .unwrap_err();
        assert!(err.is_critical());
    }
}
