//! Application-level message carried by a connection.

use serde_json::Value;

/// A named message with an arbitrary structured payload.
///
/// Used for both directions: inbound batches posted by the client and the
/// outbound queue drained by a poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub name: String,
    pub payload: Value,
}

impl Message {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}
