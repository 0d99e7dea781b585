// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor that applies a config by running an external program.

use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use fleet_engine::{ApplyError, Executor};

use crate::config::ExecutorSection;

/// Longest stderr excerpt carried into a job's error.
const STDERR_EXCERPT: usize = 512;

/// Runs `program args... <config_path>` per apply.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandExecutor {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Option<Duration>) -> Self {
        Self { program: program.into(), args, timeout }
    }

    pub fn from_config(section: &ExecutorSection) -> Self {
        let timeout = (section.timeout_secs > 0).then(|| Duration::from_secs(section.timeout_secs));
        Self::new(section.program.trim(), section.args.clone(), timeout)
    }
}

/// Run a command to completion, killing it if `timeout` elapses first.
pub async fn run_with_timeout(
    mut cmd: tokio::process::Command,
    timeout: Option<Duration>,
    description: &str,
) -> Result<Output, String> {
    cmd.kill_on_drop(true);
    let output = cmd.output();
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, output)
            .await
            .map_err(|_| format!("{description} timed out after {}s", limit.as_secs_f64()))?,
        None => output.await,
    };
    result.map_err(|e| format!("{description} failed to start: {e}"))
}

fn excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    match text.char_indices().nth(STDERR_EXCERPT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    async fn apply_path(&self, config_path: &str) -> Result<(), ApplyError> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args).arg(config_path);
        tracing::debug!(program = %self.program, config_path, "running apply command");

        let output = run_with_timeout(cmd, self.timeout, "apply command").await.map_err(ApplyError::new)?;
        if output.status.success() {
            return Ok(());
        }

        let code = output.status.code().map_or_else(|| "signal".to_string(), |c| c.to_string());
        let stderr = excerpt(&output.stderr);
        tracing::warn!(config_path, exit = %code, %stderr, "apply command failed");
        if stderr.is_empty() {
            Err(ApplyError::new(format!("apply command exited with {code}")))
        } else {
            Err(ApplyError::new(format!("apply command exited with {code}: {stderr}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Option<Duration>) -> CommandExecutor {
        CommandExecutor::new("sh", vec!["-c".into(), script.into(), "sh".into()], timeout)
    }

    #[tokio::test]
    async fn success_passes_config_path() {
        let exec = sh(r#"test "$1" = "site.yaml""#, None);
        exec.apply_path("site.yaml").await.unwrap();
    }

    #[tokio::test]
    async fn failure_carries_exit_code_and_stderr() {
        let exec = sh("echo broken >&2; exit 3", None);
        let err = exec.apply_path("site.yaml").await.unwrap_err();
        assert_eq!(err.to_string(), "apply command exited with 3: broken");
    }

    #[tokio::test]
    async fn timeout_kills_command() {
        let exec = sh("sleep 5", Some(Duration::from_millis(50)));
        let err = exec.apply_path("site.yaml").await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
    }

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let exec = CommandExecutor::new("/nonexistent/fleet-apply", Vec::new(), None);
        let err = exec.apply_path("site.yaml").await.unwrap_err();
        assert!(err.to_string().contains("failed to start"), "{err}");
    }

    #[test]
    fn zero_timeout_disables_limit() {
        let section = ExecutorSection { program: " apply ".into(), args: Vec::new(), timeout_secs: 0 };
        let exec = CommandExecutor::from_config(&section);
        assert_eq!(exec.program, "apply");
        assert!(exec.timeout.is_none());
    }
}
