use thiserror::Error;

/// Failure taxonomy shared by every store and facade operation.
///
/// Each call surfaces exactly one of these. Mutating calls that fail leave
/// their target untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("bad input: {0}")]
    BadInput(String),
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("internal error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
