//! Tokio-backed [`Scheduler`].

use std::time::Duration;

use tokio::sync::mpsc;

use crate::domain::{Scheduler, SessionId, Task, TimerHandle};

use super::event_loop::Command;

/// Feeds deferred tasks back into the event loop's own command queue, so
/// they run after the command currently being applied.
pub struct TokioScheduler {
    commands: mpsc::UnboundedSender<Command>,
}

impl TokioScheduler {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { commands }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, task: Task) {
        if self.commands.send(Command::Run(task)).is_err() {
            tracing::debug!("Event loop stopped, dropping scheduled task");
        }
    }

    fn start_timer(&self, id: &SessionId, generation: u64, after: Duration) -> TimerHandle {
        let commands = self.commands.clone();
        let id = id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // The loop may be gone already; nothing left to expire then.
            let _ = commands.send(Command::Run(Task::Expire { id, generation }));
        });
        TimerHandle::new(generation, timer.abort_handle())
    }
}
