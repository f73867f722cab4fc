//! Deferred work and timers.
//!
//! The connection state machine never does follow-up work inside the call
//! that triggered it. Flushes, inbound deliveries, handle-initiated sends and
//! timer expiries are all expressed as [`Task`]s handed to a [`Scheduler`],
//! which runs them on a later turn of the same single-threaded loop.

use std::time::Duration;

use tokio::task::AbortHandle;

use super::{Message, SessionId};

/// A unit of deferred work addressed to one connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Answer the held response with whatever is queued.
    Flush(SessionId),
    /// Deliver an inbound batch in order, stopping once the connection closes.
    Deliver {
        id: SessionId,
        messages: Vec<Message>,
    },
    /// Inactivity timer fired.
    Expire { id: SessionId, generation: u64 },
    /// Enqueue an outbound message (from a [`ConnectionHandle`](super::ConnectionHandle)).
    Send { id: SessionId, message: Message },
    /// Close the connection (from a handle, or after outbound overflow).
    Close(SessionId),
}

impl Task {
    pub fn session_id(&self) -> &SessionId {
        match self {
            Task::Flush(id) | Task::Close(id) => id,
            Task::Deliver { id, .. } | Task::Expire { id, .. } | Task::Send { id, .. } => id,
        }
    }
}

/// Runs deferred tasks on the next turn and arms inactivity timers.
pub trait Scheduler: Send + Sync {
    /// Queue a task behind everything already scheduled.
    fn schedule(&self, task: Task);

    /// Arm a timer that schedules [`Task::Expire`] after `after`.
    fn start_timer(&self, id: &SessionId, generation: u64, after: Duration) -> TimerHandle;
}

/// An armed inactivity timer.
///
/// The generation is the real guard: an expiry only counts if it carries the
/// generation of the currently armed timer. Aborting the sleeping task is
/// just hygiene.
#[derive(Debug)]
pub struct TimerHandle {
    generation: u64,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub fn new(generation: u64, abort: AbortHandle) -> Self {
        Self {
            generation,
            abort: Some(abort),
        }
    }

    /// A handle with no backing task (used by schedulers that track timers
    /// themselves).
    pub fn detached(generation: u64) -> Self {
        Self {
            generation,
            abort: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(self) {
        if let Some(abort) = self.abort {
            abort.abort();
        }
    }
}
