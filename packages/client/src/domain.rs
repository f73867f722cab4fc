//! Domain logic for client-side operations.
//!
//! Pure decisions about how to react to errors, kept free of I/O.

use crate::error::ClientError;

/// Check if the client should give up without reconnecting.
///
/// A 4xx status means the server rejected what we sent; a new session would
/// be rejected the same way.
pub fn should_exit_immediately(error: &ClientError) -> bool {
    match error {
        ClientError::Status(status) => (400..500).contains(status),
        ClientError::Protocol(_) | ClientError::Encode(_) | ClientError::ReconnectExhausted(_) => {
            true
        }
        _ => false,
    }
}

/// Check if the client should attempt to reconnect.
///
/// `current_attempt` is the number of failed attempts so far.
pub fn should_attempt_reconnect(
    error: &ClientError,
    current_attempt: u32,
    max_attempts: u32,
) -> bool {
    if should_exit_immediately(error) {
        return false;
    }

    current_attempt < max_attempts
}
