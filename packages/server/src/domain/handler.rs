//! Application callbacks and the handle applications keep to a connection.

use std::{fmt, sync::Arc};

use serde_json::Value;

use super::{Connection, Message, Scheduler, SessionId, Task};

/// Lifecycle and message notifications delivered to the application.
///
/// All methods run on the multiplexer's single event loop, one at a time,
/// never concurrently. They are notifications: the core does not inspect any
/// outcome, and failures inside them are the application's to contain.
///
/// The `&mut Connection` may be used to `send` or `close` synchronously.
/// `send` only enqueues; the flush itself happens on a later turn.
#[cfg_attr(test, mockall::automock)]
pub trait ConnectionHandler: Send + Sync {
    /// A new connection was created. Called exactly once, before any message
    /// delivery on that connection.
    fn on_connect(&self, connection: &mut Connection);

    /// An inbound message arrived.
    fn on_message(&self, connection: &mut Connection, message: &str, payload: Value);

    /// The connection closed. Called at most once.
    fn on_close(&self, connection: &mut Connection);
}

/// A cloneable reference to a connection, usable from outside callbacks.
///
/// Operations are scheduled as tasks and applied on a later turn of the event
/// loop. Operating on a closed or pruned connection is a no-op.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: SessionId,
    scheduler: Arc<dyn Scheduler>,
}

impl ConnectionHandle {
    pub(crate) fn new(id: SessionId, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { id, scheduler }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Queue an outbound message.
    pub fn send(&self, message: &str, payload: Value) {
        self.scheduler.schedule(Task::Send {
            id: self.id.clone(),
            message: Message::new(message, payload),
        });
    }

    /// Close the connection.
    pub fn close(&self) {
        self.scheduler.schedule(Task::Close(self.id.clone()));
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
