//! Error types for the updater lifecycle.

use thiserror::Error;

/// Errors that can occur while driving the update lifecycle.
///
/// None of these cross the controller boundary as a failure: the controller
/// turns them into the `error` phase or logs them.
#[derive(Error, Debug)]
pub enum UpdaterError {
    /// A phase id that is not one of the well-known lifecycle phases.
    #[error("Unknown phase id: {0}")]
    UnknownPhase(String),

    /// A collaborator was required but is not bound.
    #[error("Update service is not connected (needed for {0})")]
    ServiceUnavailable(&'static str),

    /// A collaborator rejected a command.
    #[error("Failed to {operation}: {message}")]
    Command {
        operation: &'static str,
        message: String,
    },

    /// An operation needs an update record but none is active.
    #[error("No active update (needed for {0})")]
    NoActiveUpdate(&'static str),

    /// A page failed its presentation invariants.
    #[error("Invalid page for {phase}: {reason}")]
    InvalidPage {
        phase: String,
        reason: String,
    },

    /// Reading or writing the state file failed.
    #[error("State store I/O error: {0}")]
    StoreIo(#[from] std::io::Error),

    /// The state file or a stored value is not valid JSON.
    #[error("State store format error: {0}")]
    StoreFormat(#[from] serde_json::Error),

    /// The persisted update record is not valid base64.
    #[error("Update record encoding error: {0}")]
    RecordEncoding(#[from] base64::DecodeError),
}

impl UpdaterError {
    /// Wrap a collaborator failure for `operation`
    pub fn command(operation: &'static str, err: anyhow::Error) -> Self {
        UpdaterError::Command {
            operation,
            message: format!("{:#}", err),
        }
    }
}

/// Result type alias for updater operations.
pub type Result<T> = std::result::Result<T, UpdaterError>;
