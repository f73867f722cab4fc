//! The multiplexer: many logical connections over request/response HTTP.
//!
//! ## 責務
//!
//! - session id → [`Connection`] のマップを唯一所有する
//! - 物理リクエストのエンベロープを適用し、`poll_response` に委譲する
//! - スケジュールされたタスク（フラッシュ、受信配信、タイマー）を実行する
//!
//! ## 設計ノート
//!
//! `Multiplexer` は `&mut self` だけで動く同期的な状態機械で、ロックを持たない。
//! 単一のイベントループ（`infrastructure::event_loop`）が所有し、
//! コマンドを 1 つずつ適用する。

use std::{collections::HashMap, sync::Arc, time::Duration};

use kayoi_shared::time::Clock;

use crate::domain::{
    Connection, ConnectionContext, ConnectionHandler, ConnectionSettings, PollRequest, Responder,
    ResponseToken, Scheduler, SessionId, SessionIdFactory, Task,
};

/// Default time a closed connection is kept so late reposts still get the
/// terminal frame.
pub const DEFAULT_CLOSED_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Default period of the closed-connection sweep.
pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Multiplexer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiplexerConfig {
    pub connection: ConnectionSettings,
    /// How long a closed connection stays addressable before it is pruned.
    pub closed_retention: Duration,
    /// How often the event loop sweeps closed connections.
    pub prune_interval: Duration,
}

impl Default for MultiplexerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings::default(),
            closed_retention: DEFAULT_CLOSED_RETENTION,
            prune_interval: DEFAULT_PRUNE_INTERVAL,
        }
    }
}

/// Connection counts at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MultiplexerStats {
    /// Entries in the map, closed ones included.
    pub connections: usize,
    pub open: usize,
    /// Connections currently holding a physical request open.
    pub holding: usize,
}

/// Owns every connection and applies inbound envelopes to them.
pub struct Multiplexer {
    connections: HashMap<SessionId, Connection>,
    context: ConnectionContext,
    closed_retention: Duration,
}

impl Multiplexer {
    pub fn new(
        config: MultiplexerConfig,
        handler: Arc<dyn ConnectionHandler>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            connections: HashMap::new(),
            context: ConnectionContext {
                handler,
                scheduler,
                clock,
                settings: config.connection,
            },
            closed_retention: config.closed_retention,
        }
    }

    /// Apply one physical request and answer (or hold) its response.
    pub fn handle_poll(&mut self, request: PollRequest, responder: Responder) {
        let PollRequest {
            id,
            close,
            messages,
            user_agent,
        } = request;

        let mut wait_allowed = true;
        let session_id = match id
            .as_deref()
            .and_then(|id| self.connections.get_key_value(id))
        {
            Some((existing, _)) => existing.clone(),
            None => {
                // The creator is still mid-request and cannot have subscribed
                // to anything yet, so a fresh connection answers immediately.
                wait_allowed = false;
                self.open_connection()
            }
        };

        let scheduler = Arc::clone(&self.context.scheduler);
        let Some(connection) = self.connections.get_mut(&session_id) else {
            tracing::error!("Session '{}' vanished while handling a poll", session_id);
            return;
        };

        if let Some(user_agent) = user_agent {
            connection.set_user_agent(user_agent);
        }

        if close {
            tracing::info!("Session '{}' closed by client", session_id);
            connection.close();
            wait_allowed = false;
        }

        if let Some(messages) = messages {
            wait_allowed = false;
            if !messages.is_empty() {
                tracing::debug!(
                    "Session '{}' posted {} message(s)",
                    session_id,
                    messages.len()
                );
                scheduler.schedule(Task::Deliver {
                    id: session_id.clone(),
                    messages,
                });
            }
        }

        connection.poll_response(responder, wait_allowed);
    }

    /// The transport reports that a physical request was abandoned.
    pub fn abandon(&mut self, id: &str, token: ResponseToken) {
        if let Some(connection) = self.connections.get_mut(id) {
            connection.close_response(token);
        }
    }

    /// Run one deferred task.
    pub fn run_task(&mut self, task: Task) {
        let Some(connection) = self.connections.get_mut(task.session_id()) else {
            tracing::debug!(
                "Dropping task for unknown session '{}'",
                task.session_id()
            );
            return;
        };

        match task {
            Task::Flush(_) => connection.flush(),
            Task::Deliver { messages, .. } => {
                for message in messages {
                    // A close triggered by one message suppresses the rest.
                    if connection.is_closed() {
                        break;
                    }
                    connection.received_message(&message.name, message.payload);
                }
            }
            Task::Expire { generation, .. } => {
                connection.expire(generation);
            }
            Task::Send { message, .. } => connection.send(&message.name, message.payload),
            Task::Close(_) => connection.close(),
        }
    }

    /// Forget connections that have been closed for longer than the retention.
    ///
    /// Returns the number of pruned entries.
    pub fn prune_closed(&mut self) -> usize {
        let now = self.context.clock.now_millis();
        let retention = i64::try_from(self.closed_retention.as_millis()).unwrap_or(i64::MAX);
        let before = self.connections.len();
        self.connections.retain(|_, connection| match connection.closed_at() {
            Some(closed_at) => now.saturating_sub(closed_at) < retention,
            None => true,
        });
        let pruned = before - self.connections.len();
        if pruned > 0 {
            tracing::debug!("Pruned {} closed session(s)", pruned);
        }
        pruned
    }

    /// Close every connection. Held responses receive the terminal frame.
    pub fn shutdown(&mut self) {
        tracing::info!("Closing {} session(s)", self.connections.len());
        for connection in self.connections.values_mut() {
            connection.close();
        }
    }

    pub fn stats(&self) -> MultiplexerStats {
        self.connections
            .values()
            .fold(
                MultiplexerStats {
                    connections: self.connections.len(),
                    ..MultiplexerStats::default()
                },
                |mut stats, connection| {
                    if !connection.is_closed() {
                        stats.open += 1;
                    }
                    if connection.is_holding() {
                        stats.holding += 1;
                    }
                    stats
                },
            )
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.get(id)
    }

    fn open_connection(&mut self) -> SessionId {
        let id = SessionIdFactory::generate();
        let mut connection = Connection::new(id.clone(), self.context.clone());
        tracing::info!("Session '{}' opened", id);

        let handler = Arc::clone(&self.context.handler);
        handler.on_connect(&mut connection);

        self.connections.insert(id.clone(), connection);
        id
    }
}
