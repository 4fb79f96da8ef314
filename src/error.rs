//! Error types for planning and applying slide operations.
//!
//! Every public operation returns [`Result`]. The variants follow the order in
//! which a call can fail: input validation first (nothing has touched the host
//! yet), then host open/save problems, then failures in the middle of an
//! operation sequence, and finally planner defects.
use serde::Serialize;
use thiserror::Error;

use crate::host::HostError;

/// Result type for slideshift operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for slideshift operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller-supplied index is outside its valid bounds, or two parallel
    /// request lists have different lengths.
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Duplicate source or target positions in one batch.
    #[error("Conflicting request: {0}")]
    Conflict(String),

    /// Request text that could not be parsed at all.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The host could not open (parse) the document.
    #[error("Cannot open document: {0}")]
    Open(String),

    /// The host rejected a save.
    #[error("Cannot save document: {0}")]
    Save(String),

    /// A host call failed part-way through an operation sequence.
    ///
    /// `step` is the 1-based index of the failing operation and `completed`
    /// the number of operations known to have been applied before it. A step
    /// that timed out may or may not have taken effect; its `reason` says so.
    #[error("Operation {step} failed after {completed} completed operation(s): {reason}")]
    OperationFailed {
        step: usize,
        completed: usize,
        reason: String,
    },

    /// The planner or driver reached a state that correct code never reaches.
    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while materializing working copies or reading outputs.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRange,
    Conflict,
    InvalidInput,
    Open,
    Save,
    OperationFailed,
    InternalInvariant,
    Config,
    Io,
}

impl ErrorKind {
    /// Whether the error is a mistake in the caller's request.
    ///
    /// These are always detected before the host mutates anything.
    pub fn is_user_error(self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidRange | ErrorKind::Conflict | ErrorKind::InvalidInput
        )
    }
}

impl Error {
    /// Get the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRange(_) => ErrorKind::InvalidRange,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Open(_) => ErrorKind::Open,
            Error::Save(_) => ErrorKind::Save,
            Error::OperationFailed { .. } => ErrorKind::OperationFailed,
            Error::InternalInvariant(_) => ErrorKind::InternalInvariant,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn open(err: HostError) -> Self {
        Error::Open(err.to_string())
    }

    pub(crate) fn save(err: HostError) -> Self {
        Error::Save(err.to_string())
    }

    pub(crate) fn operation(step: usize, err: HostError) -> Self {
        let reason = match err {
            HostError::Timeout(_) => format!("{} (operation {} may have been applied)", err, step),
            _ => err.to_string(),
        };
        Error::OperationFailed {
            step,
            completed: step.saturating_sub(1),
            reason,
        }
    }
}
