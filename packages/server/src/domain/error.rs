//! Domain errors.

use thiserror::Error;

/// Errors raised when building a [`SessionId`](super::SessionId).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionIdError {
    #[error("session id must not be empty")]
    Empty,

    #[error("session id is too long ({actual} bytes, max {max})")]
    TooLong { max: usize, actual: usize },
}
