//! Error types for hostmeta-collect

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while probing the host
#[derive(Error, Debug, Clone)]
pub enum CollectError {
    /// Probe process could not be started
    #[error("failed to spawn process: {0}")]
    Spawn(String),

    /// I/O error while waiting for the probe
    #[error("I/O error: {0}")]
    Io(String),

    /// Probe did not finish in time
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout that was exceeded
        timeout: Duration,
    },

    /// Probe exited non-zero
    #[error("command failed: {status} - {stderr}")]
    CommandFailed {
        /// Exit status
        status: i32,
        /// Stderr output
        stderr: String,
    },

    /// Probe tool is not installed on this host
    #[error("command not available: {0}")]
    Unavailable(String),

    /// Probe output could not be understood
    #[error("parse error: {0}")]
    Parse(String),
}

impl CollectError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, CollectError::Timeout { .. } | CollectError::Io(_))
    }

    /// Check if the probe tool is missing rather than broken
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CollectError::Unavailable(_))
    }
}
