//! Domain layer: session identity, messages and the connection state machine.

mod connection;
mod envelope;
mod error;
mod handler;
mod message;
mod reply;
mod scheduler;
mod session_id;

#[cfg(test)]
pub(crate) mod test_utils;

pub use connection::{
    Connection, ConnectionContext, ConnectionSettings, DEFAULT_MAX_OUTBOUND,
    DEFAULT_SESSION_TIMEOUT,
};
pub use envelope::PollRequest;
pub use error::SessionIdError;
#[cfg(test)]
pub use handler::MockConnectionHandler;
pub use handler::{ConnectionHandle, ConnectionHandler};
pub use message::Message;
pub use reply::{PollReply, PollResponse, Responder, ResponseToken};
pub use scheduler::{Scheduler, Task, TimerHandle};
pub use session_id::{SessionId, SessionIdFactory};
