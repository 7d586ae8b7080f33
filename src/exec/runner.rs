use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use crate::errors::AutopatchError;
use crate::models::ResolvedStep;
use tracing::debug;

/// Prefix of `s` holding at most `max` characters.
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Captured result of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Short description of a failed run for error messages.
    pub fn failure_detail(&self) -> String {
        let status = match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, truncate(stderr, 500))
        }
    }
}

/// Process-execution seam used by the patch executor.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, step: &ResolvedStep, timeout: Duration) -> Result<CommandOutput, AutopatchError>;
}

/// Runs each step through `sh -c` in the step's working directory.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, step: &ResolvedStep, timeout: Duration) -> Result<CommandOutput, AutopatchError> {
        debug!(
            step = %step.name,
            command = %truncate(&step.command_line, 200),
            cwd = %step.working_dir.display(),
            "Executing step"
        );

        let child = Command::new("sh")
            .arg("-c")
            .arg(&step.command_line)
            .current_dir(&step.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| AutopatchError::Timeout(format!(
                "Command timed out after {}s: {}",
                timeout.as_secs(),
                truncate(&step.command_line, 100)
            )))??;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
