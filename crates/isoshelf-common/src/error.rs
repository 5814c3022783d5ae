//! Unified error types for the isoshelf workspace.
//!
//! Outcomes that are informational rather than failures (a registry entry
//! that already exists, a single device that refused to eject) are modelled
//! as values by the crates that produce them, not as variants here.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum IsoshelfError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Operator-supplied input was empty or malformed. Nothing was changed.
    #[error("invalid {field}: {message}")]
    InvalidInput {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },

    /// A catalog path or other resource does not resolve.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// The network mount did not succeed. No registry change was made.
    #[error("mounting {name} at {target} failed: {reason}")]
    MountFailed {
        /// Storage name of the item.
        name: String,
        /// Local mount target.
        target: PathBuf,
        /// Failure reported by the mount step.
        reason: String,
    },

    /// Both the graceful and the forced unmount failed. The registry entry
    /// was left in place.
    #[error("unmounting {name} at {target} failed (graceful: {graceful}; forced: {forced})")]
    UnmountFailed {
        /// Storage name of the item.
        name: String,
        /// Local mount target.
        target: PathBuf,
        /// Error from the graceful unmount.
        graceful: String,
        /// Error from the lazy/forced unmount.
        forced: String,
    },

    /// A host tool ran but reported failure.
    #[error("`{program}` failed: {message}")]
    Command {
        /// Program that was invoked.
        program: String,
        /// Exit status and captured stderr.
        message: String,
    },

    /// A required host tool is not installed.
    #[error("required tool `{tool}` not found in PATH")]
    ToolMissing {
        /// Name of the missing executable.
        tool: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl IsoshelfError {
    /// Builds an [`IsoshelfError::Io`] for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds an [`IsoshelfError::InvalidInput`] for the given field.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, IsoshelfError>;
