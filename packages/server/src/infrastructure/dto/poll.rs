//! Long-polling envelope DTOs.
//!
//! Request and response bodies are single JSON documents. Field names are
//! kept short on the wire: `m` is a message list (or a message name inside a
//! list entry), `d` is a payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One message on the wire: `{"m": name, "d": payload}`.
///
/// `d` is omitted when the payload is `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub m: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub d: Value,
}

/// Request body posted by the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollRequestDto {
    /// Session to resume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Ask the server to close the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<bool>,
    /// Inbound batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<Vec<WireMessage>>,
}

/// Response body. Exactly one of `close`, `m`, `old` is present, or none of
/// them for a plain acknowledgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResponseDto {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<Vec<WireMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<bool>,
}
