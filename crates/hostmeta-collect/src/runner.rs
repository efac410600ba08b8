//! Probe command execution

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::error::CollectError;

/// Exit status shells use for "command not found"
const STATUS_NOT_FOUND: i32 = 127;

/// Output of one probe command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit status code (0 for success)
    pub status: i32,
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            duration: Duration::ZERO,
        }
    }

    /// Failed output with the given status and stderr
    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
            duration: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Stdout of a successful run, or the matching error
    ///
    /// # Errors
    /// Returns `Unavailable` for exit status 127 and `CommandFailed` for any
    /// other non-zero status.
    pub fn into_stdout(self, cmd: &str) -> Result<String, CollectError> {
        match self.status {
            0 => Ok(self.stdout),
            STATUS_NOT_FOUND => Err(CollectError::Unavailable(cmd.to_string())),
            status => Err(CollectError::CommandFailed {
                status,
                stderr: self.stderr.trim().to_string(),
            }),
        }
    }
}

/// Runs shell commands for the collector
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, cmd: &str) -> Result<CommandOutput, CollectError>;

    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, CollectError>;

    fn runner_type(&self) -> &'static str;
}

/// Runs probes on this machine through `sh -c`
#[derive(Debug, Clone, Default)]
pub struct LocalRunner;

impl LocalRunner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn execute(&self, cmd: &str) -> Result<CommandOutput, CollectError> {
        let start = Instant::now();

        let child = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CollectError::Spawn(e.to_string()))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CollectError::Io(e.to_string()))?;

        let status = output.status.code().unwrap_or(-1);
        let duration = start.elapsed();
        debug!(command = %cmd, status, duration = ?duration, "probe finished");

        Ok(CommandOutput {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration,
        })
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    #[instrument(skip(self), level = "debug")]
    async fn run(&self, cmd: &str) -> Result<CommandOutput, CollectError> {
        self.execute(cmd).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout_duration: Duration,
    ) -> Result<CommandOutput, CollectError> {
        match timeout(timeout_duration, self.execute(cmd)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(command = %cmd, timeout = ?timeout_duration, "probe timed out");
                Err(CollectError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }

    fn runner_type(&self) -> &'static str {
        "local"
    }
}

/// Quote `arg` for inclusion in a `sh -c` command line
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "'\"'\"'"))
}
