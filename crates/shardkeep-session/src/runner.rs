//! Shell command execution.
//!
//! The game is driven entirely through shell pipelines (`screen`, `ps`,
//! `grep`, `steamcmd`, `zip`). [`CommandRunner`] is the one seam where
//! those pipelines leave the process, so tests can swap in a fake that
//! records what would have run.

use std::path::PathBuf;

use crate::SessionError;

/// Captured result of one shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `true` when the command exited with status 0.
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Converts an unsuccessful exit into [`SessionError::CommandFailed`].
    pub fn check(self, command: &str) -> Result<Self, SessionError> {
        if self.success {
            Ok(self)
        } else {
            Err(SessionError::CommandFailed {
                command: command.to_owned(),
                stderr: self.stderr.trim().to_owned(),
            })
        }
    }
}

/// Runs a shell command line and captures its output.
///
/// Implementations must not treat a non-zero exit as an `Err`: callers
/// like the status probe rely on `grep` exiting 1 to mean "not found".
/// `Err` is reserved for failing to run the command at all.
pub trait CommandRunner: Send + Sync + 'static {
    fn run(
        &self,
        command: &str,
    ) -> impl std::future::Future<Output = Result<CommandOutput, SessionError>> + Send;
}

/// Runs commands through `/bin/bash -c` from a fixed working directory.
///
/// The working directory matters: launch commands use paths relative to
/// the platform root (`cd dst/bin64/ && ...`).
#[derive(Debug, Clone)]
pub struct BashRunner {
    work_dir: PathBuf,
}

impl BashRunner {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &std::path::Path {
        &self.work_dir
    }
}

impl CommandRunner for BashRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput, SessionError> {
        tracing::debug!(command, "running shell command");
        let output = tokio::process::Command::new("/bin/bash")
            .arg("-c")
            .arg(command)
            .current_dir(&self.work_dir)
            .output()
            .await
            .map_err(|source| SessionError::Spawn {
                command: command.to_owned(),
                source,
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bash_runner_captures_stdout_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let runner = BashRunner::new(dir.path());

        let out = runner.run("echo hello && pwd").await.unwrap();
        assert!(out.success);
        assert!(out.stdout.starts_with("hello\n"));

        let out = runner.run("exit 3").await.unwrap();
        assert!(!out.success);
    }

    #[test]
    fn test_check_maps_failure() {
        let out = CommandOutput {
            success: false,
            stdout: String::new(),
            stderr: "boom\n".into(),
        };
        let err = out.check("false").unwrap_err();
        assert!(matches!(err, SessionError::CommandFailed { stderr, .. } if stderr == "boom"));
    }
}
