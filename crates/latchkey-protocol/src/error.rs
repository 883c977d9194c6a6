use thiserror::Error;

/// Fixed wording shown whenever the privilege backend cannot be contacted.
pub const BACKEND_UNREACHABLE_MESSAGE: &str =
    "Privilege backend is unreachable. Run the unlock first.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("{BACKEND_UNREACHABLE_MESSAGE} ({0})")]
    Unreachable(String),
    #[error("backend target not found: {0}")]
    NotFound(String),
    #[error("backend permission denied: {0}")]
    PermissionDenied(String),
    #[error("backend process error: {0}")]
    Process(String),
    #[error("backend protocol error: {0}")]
    Protocol(String),
    #[error("backend internal error: {0}")]
    Internal(String),
}

pub type BackendResult<T> = Result<T, BackendError>;
