//! The single task that owns the [`Multiplexer`].
//!
//! HTTP handlers never touch connection state directly. They send commands
//! through a [`MultiplexerHandle`]; the loop applies them one at a time,
//! together with the tasks the connections schedule for themselves. That
//! queue is the "next scheduler turn" of the connection state machine.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use kayoi_shared::time::Clock;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::MissedTickBehavior,
};

use crate::{
    domain::{ConnectionHandler, PollRequest, PollResponse, Responder, ResponseToken, Task},
    usecase::{Multiplexer, MultiplexerConfig, MultiplexerStats},
};

use super::scheduler::TokioScheduler;

/// Shortest accepted prune period; `tokio::time::interval` rejects zero.
const MIN_PRUNE_INTERVAL: Duration = Duration::from_millis(1);

/// Errors returned by [`MultiplexerHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MultiplexerError {
    #[error("multiplexer event loop is not running")]
    Stopped,

    #[error("response was dropped before it was answered")]
    ResponseDropped,
}

pub(crate) enum Command {
    Poll {
        request: PollRequest,
        responder: Responder,
    },
    Abandon {
        id: String,
        token: ResponseToken,
    },
    Run(Task),
    Stats(oneshot::Sender<MultiplexerStats>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable entry point to the event loop.
#[derive(Clone)]
pub struct MultiplexerHandle {
    commands: mpsc::UnboundedSender<Command>,
    next_token: Arc<AtomicU64>,
}

impl MultiplexerHandle {
    /// Submit a physical request and wait for its answer.
    ///
    /// If the returned future is dropped before the answer arrives (the
    /// client went away), the connection is told that its held response was
    /// abandoned.
    pub async fn poll(&self, request: PollRequest) -> Result<PollResponse, MultiplexerError> {
        let token = ResponseToken::new(self.next_token.fetch_add(1, Ordering::Relaxed));
        let (responder, rx) = Responder::channel(token);
        let mut guard = AbandonGuard {
            commands: self.commands.clone(),
            id: request.id.clone(),
            token,
        };

        self.commands
            .send(Command::Poll { request, responder })
            .map_err(|_| MultiplexerError::Stopped)?;
        let response = rx.await.map_err(|_| MultiplexerError::ResponseDropped)?;

        guard.disarm();
        Ok(response)
    }

    pub async fn stats(&self) -> Result<MultiplexerStats, MultiplexerError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Stats(tx))
            .map_err(|_| MultiplexerError::Stopped)?;
        rx.await.map_err(|_| MultiplexerError::Stopped)
    }

    /// Close every session and stop the loop.
    pub async fn shutdown(&self) -> Result<(), MultiplexerError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Shutdown(tx))
            .map_err(|_| MultiplexerError::Stopped)?;
        rx.await.map_err(|_| MultiplexerError::Stopped)
    }
}

/// Reports an unanswered poll as abandoned when dropped.
struct AbandonGuard {
    commands: mpsc::UnboundedSender<Command>,
    id: Option<String>,
    token: ResponseToken,
}

impl AbandonGuard {
    fn disarm(&mut self) {
        self.id = None;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        // Only requests naming a session can ever be held.
        if let Some(id) = self.id.take() {
            let _ = self.commands.send(Command::Abandon {
                id,
                token: self.token,
            });
        }
    }
}

/// Start the event loop on the current tokio runtime.
pub fn spawn_multiplexer(
    config: MultiplexerConfig,
    handler: Arc<dyn ConnectionHandler>,
    clock: Arc<dyn Clock>,
) -> (MultiplexerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let scheduler = Arc::new(TokioScheduler::new(tx.clone()));
    let multiplexer = Multiplexer::new(config, handler, scheduler, clock);
    let task = tokio::spawn(run(multiplexer, rx, config.prune_interval));

    let handle = MultiplexerHandle {
        commands: tx,
        next_token: Arc::new(AtomicU64::new(1)),
    };
    (handle, task)
}

async fn run(
    mut multiplexer: Multiplexer,
    mut commands: mpsc::UnboundedReceiver<Command>,
    prune_interval: Duration,
) {
    let mut prune = tokio::time::interval(prune_interval.max(MIN_PRUNE_INTERVAL));
    prune.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!("Multiplexer event loop started");
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Poll { request, responder }) => {
                    multiplexer.handle_poll(request, responder);
                }
                Some(Command::Abandon { id, token }) => multiplexer.abandon(&id, token),
                Some(Command::Run(task)) => multiplexer.run_task(task),
                Some(Command::Stats(reply)) => {
                    let _ = reply.send(multiplexer.stats());
                }
                Some(Command::Shutdown(reply)) => {
                    multiplexer.shutdown();
                    let _ = reply.send(());
                    break;
                }
                None => {
                    multiplexer.shutdown();
                    break;
                }
            },
            _ = prune.tick() => {
                multiplexer.prune_closed();
            }
        }
    }
    tracing::debug!("Multiplexer event loop stopped");
}
