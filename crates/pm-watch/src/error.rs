//! Error types for power-state observation

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for watcher operations
pub type Result<T> = std::result::Result<T, PmError>;

/// Errors that can occur while observing or waiting on power state
///
/// A wait that runs out of time is not an error; see [`crate::WaitOutcome`].
#[derive(Debug, Error)]
pub enum PmError {
    /// Neither runtime-PM status nor residency counters are usable
    #[error("Unsupported platform: {reason}")]
    UnsupportedPlatform {
        /// What was missing
        reason: String,
    },

    /// A status source produced something outside the agreed vocabulary
    #[error("Contract violation: unknown runtime status {content:?}")]
    ContractViolation {
        /// Raw content read from the source
        content: String,
    },

    /// Caller passed a target or deadline the watcher cannot honour
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Reason for rejection
        reason: String,
    },

    /// Required sysfs / device node does not exist
    #[error("Not found: {path}")]
    NotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// Environment setup step failed
    #[error("Setup failed: {reason}")]
    Setup {
        /// Reason for failure
        reason: String,
    },

    /// I/O error talking to sysfs, debugfs or the MSR device
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl PmError {
    /// Create an unsupported platform error
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            reason: reason.into(),
        }
    }

    /// Create a contract violation error
    pub fn contract_violation(content: impl Into<String>) -> Self {
        Self::ContractViolation {
            content: content.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a setup error
    pub fn setup(reason: impl Into<String>) -> Self {
        Self::Setup {
            reason: reason.into(),
        }
    }

    /// Whether this error should abort the enclosing test run
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidArgument { .. })
    }
}

impl From<rustix::io::Errno> for PmError {
    fn from(errno: rustix::io::Errno) -> Self {
        Self::Io {
            source: errno.into(),
        }
    }
}
