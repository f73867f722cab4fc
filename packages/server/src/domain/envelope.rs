//! Inbound envelope after wire decoding.

use super::Message;

/// One physical request, decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollRequest {
    /// Session to resume. Unknown or absent ids start a new session.
    pub id: Option<String>,
    /// The client asks to close the session.
    pub close: bool,
    /// Inbound batch. `Some` even when empty: an empty batch still means the
    /// request must not be held.
    pub messages: Option<Vec<Message>>,
    /// Client identity header, if sent.
    pub user_agent: Option<String>,
}
