//! Error types for the long-polling client.

use kayoi_server::infrastructure::dto::conversion::ResponseDecodeError;
use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or its body could not be read
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("Server responded with status {0}")]
    Status(u16),

    /// The response body is not a valid envelope
    #[error("Invalid response: {0}")]
    Protocol(#[from] ResponseDecodeError),

    /// An outgoing payload could not be encoded as JSON
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The server closed the session
    #[error("Session '{0}' was closed by the server")]
    SessionClosed(String),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Every reconnection attempt failed
    #[error("Failed to reconnect after {0} attempts")]
    ReconnectExhausted(u32),
}
