//! Error types for hostmeta-core

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during inventory store and merge operations
#[derive(Error, Debug)]
pub enum InventoryError {
    /// A JSON file is present but not parseable, or has the wrong shape
    #[error("malformed JSON in {}: {message}", path.display())]
    Format {
        /// Offending file
        path: PathBuf,
        /// Parser or shape error
        message: String,
    },

    /// Hostname absent from the store
    #[error("host not found: {0}")]
    HostNotFound(String),

    /// Key absent from an existing host record
    #[error("key `{key}` not found for host `{host}`")]
    KeyNotFound {
        /// Host that was searched
        host: String,
        /// Missing key
        key: String,
    },

    /// Operation invoked out of its required sequence
    #[error("invalid state: {0}")]
    State(String),

    /// Refusing to overwrite an existing file
    #[error("file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// Filesystem error
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization failed while writing
    #[error("serialization failed: {0}")]
    Serialize(String),
}

impl InventoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InventoryError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        InventoryError::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check if a lookup missed a host or key
    ///
    /// Callers report these and carry on; everything else is fatal for the
    /// current operation.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            InventoryError::HostNotFound(_) | InventoryError::KeyNotFound { .. }
        )
    }
}
