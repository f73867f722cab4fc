//! Answers written to physical poll requests.

use tokio::sync::oneshot;

use super::{Message, SessionId};

/// What a physical poll request is answered with.
///
/// Exactly one variant per response; they map onto the mutually exclusive
/// wire shapes `{id, close: true}`, `{id, m: [...]}`, `{id, old: true}` and
/// `{id}`.
#[derive(Debug, Clone, PartialEq)]
pub enum PollReply {
    /// The connection is closed. Terminal.
    Closed,
    /// Outbound backlog, in enqueue order.
    Messages(Vec<Message>),
    /// A newer poll for the same connection replaced this one.
    Superseded,
    /// Nothing pending.
    Ack,
}

/// A reply addressed to a session.
#[derive(Debug, Clone, PartialEq)]
pub struct PollResponse {
    pub id: SessionId,
    pub reply: PollReply,
}

/// Identity of one physical request, used to tell held responses apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponseToken(u64);

impl ResponseToken {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Write side of one physical response.
///
/// Consumed when the response is answered, so a response can never be
/// written twice.
#[derive(Debug)]
pub struct Responder {
    token: ResponseToken,
    tx: oneshot::Sender<PollResponse>,
}

impl Responder {
    /// Create a responder and the receiver the transport awaits on.
    pub fn channel(token: ResponseToken) -> (Self, oneshot::Receiver<PollResponse>) {
        let (tx, rx) = oneshot::channel();
        (Self { token, tx }, rx)
    }

    pub fn token(&self) -> ResponseToken {
        self.token
    }

    /// Answer the physical request.
    ///
    /// Best effort: if the client already went away the reply is dropped.
    pub fn respond(self, id: &SessionId, reply: PollReply) {
        let token = self.token;
        let response = PollResponse {
            id: id.clone(),
            reply,
        };
        if self.tx.send(response).is_err() {
            tracing::debug!(
                "Response {} for session '{}' has no receiver, dropping reply",
                token.value(),
                id
            );
        }
    }
}
