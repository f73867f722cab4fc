//! The per-session state machine.
//!
//! A [`Connection`] decides, for every physical request that reaches it,
//! whether to answer now or hold the request open until there is something to
//! say. It never writes a response from inside a call that could still be on
//! the caller's own request-handling stack; such follow-ups go through the
//! [`Scheduler`].

use std::{sync::Arc, time::Duration};

use kayoi_shared::time::Clock;
use serde_json::Value;

use super::{
    ConnectionHandle, ConnectionHandler, Message, PollReply, Responder, ResponseToken, Scheduler,
    SessionId, Task, TimerHandle,
};

/// Default inactivity period after which an unpolled connection is closed.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(15);

/// Default cap on queued outbound messages per connection.
pub const DEFAULT_MAX_OUTBOUND: usize = 10_000;

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Quiet period with no held response before the connection is closed.
    pub session_timeout: Duration,
    /// Queued outbound messages allowed before the connection is treated as
    /// a slow consumer and closed.
    pub max_outbound: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            max_outbound: DEFAULT_MAX_OUTBOUND,
        }
    }
}

/// Collaborators shared by every connection of one multiplexer.
#[derive(Clone)]
pub struct ConnectionContext {
    pub handler: Arc<dyn ConnectionHandler>,
    pub scheduler: Arc<dyn Scheduler>,
    pub clock: Arc<dyn Clock>,
    pub settings: ConnectionSettings,
}

/// One logical bidirectional channel.
pub struct Connection {
    id: SessionId,
    closed: bool,
    outbound: Vec<Message>,
    held: Option<Responder>,
    timer: Option<TimerHandle>,
    timer_generation: u64,
    overflowed: bool,
    user_agent: String,
    connected_at: i64,
    closed_at: Option<i64>,
    context: ConnectionContext,
}

impl Connection {
    /// Create a connection and arm its inactivity timer.
    pub fn new(id: SessionId, context: ConnectionContext) -> Self {
        let connected_at = context.clock.now_millis();
        let mut connection = Self {
            id,
            closed: false,
            outbound: Vec::new(),
            held: None,
            timer: None,
            timer_generation: 0,
            overflowed: false,
            user_agent: String::new(),
            connected_at,
            closed_at: None,
            context,
        };
        connection.rearm_timer();
        connection
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Last seen client identity. Advisory only.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub(crate) fn set_user_agent(&mut self, user_agent: String) {
        self.user_agent = user_agent;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_holding(&self) -> bool {
        self.held.is_some()
    }

    /// Number of outbound messages waiting for a poll.
    pub fn pending(&self) -> usize {
        self.outbound.len()
    }

    pub fn connected_at(&self) -> i64 {
        self.connected_at
    }

    pub fn closed_at(&self) -> Option<i64> {
        self.closed_at
    }

    /// A handle the application can keep and use outside callbacks.
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle::new(self.id.clone(), Arc::clone(&self.context.scheduler))
    }

    /// Queue an outbound message.
    ///
    /// If a response is held and the queue was empty, a flush is scheduled
    /// for the next turn. Messages sent after close are discarded.
    pub fn send(&mut self, message: &str, payload: Value) {
        if self.closed {
            tracing::debug!(
                "Dropping '{}' for closed session '{}'",
                message,
                self.id
            );
            return;
        }

        if self.outbound.len() >= self.context.settings.max_outbound {
            if !self.overflowed {
                self.overflowed = true;
                tracing::warn!(
                    "Session '{}' has {} unpolled messages, closing slow consumer",
                    self.id,
                    self.outbound.len()
                );
                self.context.scheduler.schedule(Task::Close(self.id.clone()));
            }
            return;
        }

        self.outbound.push(Message::new(message, payload));
        if self.held.is_some() && self.outbound.len() == 1 {
            self.context.scheduler.schedule(Task::Flush(self.id.clone()));
        }
    }

    /// Hand an inbound message to the application.
    pub fn received_message(&mut self, message: &str, payload: Value) {
        let handler = Arc::clone(&self.context.handler);
        handler.on_message(self, message, payload);
    }

    /// Close the connection.
    ///
    /// `on_close` fires only on the first call. Every call cancels the timer
    /// and answers a held response with the terminal frame.
    pub fn close(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }

        if !self.closed {
            self.closed = true;
            self.closed_at = Some(self.context.clock.now_millis());
            self.outbound.clear();
            tracing::info!("Session '{}' closed", self.id);

            let handler = Arc::clone(&self.context.handler);
            handler.on_close(self);
        }

        if let Some(held) = self.held.take() {
            held.respond(&self.id, PollReply::Closed);
        }
    }

    /// Decide what to do with a physical request.
    ///
    /// Answers immediately when closed, when there is a backlog, or when
    /// holding is not allowed. Otherwise the responder becomes the held
    /// response, superseding any previous one.
    pub fn poll_response(&mut self, responder: Responder, wait_allowed: bool) {
        let reply = if self.closed {
            PollReply::Closed
        } else if !self.outbound.is_empty() {
            PollReply::Messages(std::mem::take(&mut self.outbound))
        } else if wait_allowed {
            self.hold(responder);
            return;
        } else {
            PollReply::Ack
        };

        tracing::debug!("Session '{}' answered with {:?}", self.id, reply);
        responder.respond(&self.id, reply);
    }

    /// Answer the held response, if any, with the current state.
    pub fn flush(&mut self) {
        if let Some(held) = self.held.take() {
            self.poll_response(held, false);
            self.release_hold();
        }
    }

    /// The transport reports that a physical request went away unanswered.
    ///
    /// The connection survives; the client is expected to poll again.
    pub fn close_response(&mut self, token: ResponseToken) {
        if self.held.as_ref().map(Responder::token) == Some(token) {
            tracing::debug!("Held response of session '{}' abandoned", self.id);
            self.held = None;
            self.release_hold();
        }
    }

    /// Inactivity timer fired. Returns `true` when this closed the connection.
    ///
    /// Stale expiries (from a timer that has since been cancelled or
    /// re-armed) are ignored.
    pub fn expire(&mut self, generation: u64) -> bool {
        match &self.timer {
            Some(timer) if timer.generation() == generation => {}
            _ => return false,
        }
        self.timer = None;

        if self.held.is_some() {
            return false;
        }
        tracing::info!("Session '{}' timed out", self.id);
        self.close();
        true
    }

    fn hold(&mut self, responder: Responder) {
        if let Some(previous) = self.held.replace(responder) {
            tracing::debug!("Session '{}' superseded a held response", self.id);
            previous.respond(&self.id, PollReply::Superseded);
        }
    }

    fn release_hold(&mut self) {
        if !self.closed {
            self.rearm_timer();
        }
    }

    fn rearm_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.timer_generation += 1;
        self.timer = Some(self.context.scheduler.start_timer(
            &self.id,
            self.timer_generation,
            self.context.settings.session_timeout,
        ));
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.closed)
            .field("pending", &self.outbound.len())
            .field("holding", &self.held.is_some())
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::{
        MockConnectionHandler,
        test_utils::{Event, RecordingHandler, RecordingScheduler, context, responder},
    };

    fn new_connection() -> (Connection, Arc<RecordingHandler>, Arc<RecordingScheduler>) {
        let handler = Arc::new(RecordingHandler::default());
        let scheduler = Arc::new(RecordingScheduler::default());
        let connection = Connection::new(
            SessionId::new("session-1".to_string()).unwrap(),
            context(handler.clone(), scheduler.clone()),
        );
        (connection, handler, scheduler)
    }

    #[test]
    fn test_new_connection_arms_timer() {
        // テスト項目: 作成時に非アクティブタイマーが起動される
        // given (前提条件):

        // when (操作):
        let (connection, _handler, scheduler) = new_connection();

        // then (期待する結果):
        assert_eq!(
            scheduler.timers(),
            vec![(connection.id().clone(), 1, DEFAULT_SESSION_TIMEOUT)]
        );
        assert!(!connection.is_closed());
    }

    #[test]
    fn test_poll_returns_queued_messages_in_order_and_drains() {
        // テスト項目: ポーリング間の send がキュー順に返され、キューが空になる
        // given (前提条件):
        let (mut connection, _handler, _scheduler) = new_connection();
        connection.send("a", json!(1));
        connection.send("b", json!({"k": "v"}));
        connection.send("c", Value::Null);
        let (tx, mut rx) = responder(1);

        // when (操作):
        connection.poll_response(tx, true);

        // then (期待する結果):
        let response = rx.try_recv().unwrap();
        assert_eq!(
            response.reply,
            PollReply::Messages(vec![
                Message::new("a", json!(1)),
                Message::new("b", json!({"k": "v"})),
                Message::new("c", Value::Null),
            ])
        );
        assert_eq!(connection.pending(), 0);
        assert!(!connection.is_holding());
    }

    #[test]
    fn test_poll_without_backlog_and_no_wait_acks() {
        // テスト項目: バックログがなく待機不可の場合は空の応答を返す
        // given (前提条件):
        let (mut connection, _handler, _scheduler) = new_connection();
        let (tx, mut rx) = responder(1);

        // when (操作):
        connection.poll_response(tx, false);

        // then (期待する結果):
        let response = rx.try_recv().unwrap();
        assert_eq!(response.id, *connection.id());
        assert_eq!(response.reply, PollReply::Ack);
    }

    #[test]
    fn test_poll_with_wait_allowed_holds_response() {
        // テスト項目: 待機可能でバックログがない場合はレスポンスを保持する
        // given (前提条件):
        let (mut connection, _handler, _scheduler) = new_connection();
        let (tx, mut rx) = responder(1);

        // when (操作):
        connection.poll_response(tx, true);

        // then (期待する結果):
        assert!(connection.is_holding());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_second_holding_poll_supersedes_first() {
        // テスト項目: 2 つ目の待機ポーリングが 1 つ目を old として解放する
        // given (前提条件):
        let (mut connection, _handler, _scheduler) = new_connection();
        let (first, mut first_rx) = responder(1);
        let (second, mut second_rx) = responder(2);
        connection.poll_response(first, true);

        // when (操作):
        connection.poll_response(second, true);

        // then (期待する結果):
        assert_eq!(first_rx.try_recv().unwrap().reply, PollReply::Superseded);
        assert!(second_rx.try_recv().is_err());
        assert!(connection.is_holding());
    }

    #[test]
    fn test_send_while_holding_schedules_single_flush() {
        // テスト項目: 保持中の send は同期的に応答せず、フラッシュを 1 回だけ予約する
        // given (前提条件):
        let (mut connection, _handler, scheduler) = new_connection();
        let (tx, mut rx) = responder(1);
        connection.poll_response(tx, true);

        // when (操作):
        connection.send("ping", json!(1));
        connection.send("pong", json!(2));

        // then (期待する結果):
        assert!(rx.try_recv().is_err());
        assert_eq!(
            scheduler.tasks(),
            vec![Task::Flush(connection.id().clone())]
        );
    }

    #[test]
    fn test_flush_answers_held_response_and_rearms_timer() {
        // テスト項目: フラッシュで保持中のレスポンスにメッセージを返し、タイマーを再起動する
        // given (前提条件):
        let (mut connection, _handler, scheduler) = new_connection();
        let (tx, mut rx) = responder(1);
        connection.poll_response(tx, true);
        connection.send("ping", json!(1));

        // when (操作):
        connection.flush();

        // then (期待する結果):
        assert_eq!(
            rx.try_recv().unwrap().reply,
            PollReply::Messages(vec![Message::new("ping", json!(1))])
        );
        assert!(!connection.is_holding());
        assert_eq!(scheduler.timers().len(), 2);
        assert_eq!(scheduler.timers()[1].1, 2);
    }

    #[test]
    fn test_flush_without_held_response_is_noop() {
        // テスト項目: 保持中のレスポンスがなければフラッシュは何もしない
        // given (前提条件):
        let (mut connection, _handler, scheduler) = new_connection();
        connection.send("ping", json!(1));

        // when (操作):
        connection.flush();

        // then (期待する結果):
        assert_eq!(connection.pending(), 1);
        assert_eq!(scheduler.timers().len(), 1);
    }

    #[test]
    fn test_close_answers_held_response_with_close() {
        // テスト項目: close で保持中のレスポンスに close を返す
        // given (前提条件):
        let (mut connection, handler, _scheduler) = new_connection();
        let (tx, mut rx) = responder(1);
        connection.poll_response(tx, true);

        // when (操作):
        connection.close();

        // then (期待する結果):
        assert_eq!(rx.try_recv().unwrap().reply, PollReply::Closed);
        assert!(connection.is_closed());
        assert!(!connection.is_holding());
        assert_eq!(connection.closed_at(), Some(1_000));
        assert_eq!(
            handler.events(),
            vec![Event::Close(connection.id().clone())]
        );
    }

    #[test]
    fn test_close_twice_fires_on_close_once() {
        // テスト項目: close を 2 回呼んでも on_close は 1 回だけ呼ばれる
        // given (前提条件):
        let mut handler = MockConnectionHandler::new();
        handler.expect_on_close().times(1).return_const(());
        let scheduler = Arc::new(RecordingScheduler::default());
        let mut connection = Connection::new(
            SessionId::new("session-1".to_string()).unwrap(),
            context(Arc::new(handler), scheduler),
        );

        // when (操作):
        connection.close();
        connection.close();

        // then (期待する結果):
        assert!(connection.is_closed());
    }

    #[test]
    fn test_poll_after_close_always_answers_close() {
        // テスト項目: close 後のポーリングは待機可否に関わらず常に close を返す
        // given (前提条件):
        let (mut connection, _handler, _scheduler) = new_connection();
        connection.close();
        let (waiting, mut waiting_rx) = responder(1);
        let (immediate, mut immediate_rx) = responder(2);

        // when (操作):
        connection.poll_response(waiting, true);
        connection.poll_response(immediate, false);

        // then (期待する結果):
        assert_eq!(waiting_rx.try_recv().unwrap().reply, PollReply::Closed);
        assert_eq!(immediate_rx.try_recv().unwrap().reply, PollReply::Closed);
        assert!(!connection.is_holding());
    }

    #[test]
    fn test_send_after_close_is_discarded() {
        // テスト項目: close 後の send は破棄される
        // given (前提条件):
        let (mut connection, _handler, scheduler) = new_connection();
        connection.close();

        // when (操作):
        connection.send("late", json!(null));

        // then (期待する結果):
        assert_eq!(connection.pending(), 0);
        assert!(scheduler.tasks().is_empty());
    }

    #[test]
    fn test_close_response_releases_matching_hold() {
        // テスト項目: 保持中のレスポンスが切断されると保持を解除しタイマーを再起動する
        // given (前提条件):
        let (mut connection, _handler, scheduler) = new_connection();
        let (tx, _rx) = responder(7);
        connection.poll_response(tx, true);

        // when (操作):
        connection.close_response(ResponseToken::new(7));

        // then (期待する結果):
        assert!(!connection.is_holding());
        assert!(!connection.is_closed());
        assert_eq!(scheduler.timers().len(), 2);
    }

    #[test]
    fn test_close_response_ignores_other_tokens() {
        // テスト項目: 保持中以外のレスポンスの切断は無視される
        // given (前提条件):
        let (mut connection, _handler, scheduler) = new_connection();
        let (tx, _rx) = responder(7);
        connection.poll_response(tx, true);

        // when (操作):
        connection.close_response(ResponseToken::new(8));

        // then (期待する結果):
        assert!(connection.is_holding());
        assert_eq!(scheduler.timers().len(), 1);
    }

    #[test]
    fn test_expire_without_held_response_closes() {
        // テスト項目: 保持中のレスポンスがない状態でタイマーが発火すると close される
        // given (前提条件):
        let (mut connection, handler, _scheduler) = new_connection();

        // when (操作):
        let closed = connection.expire(1);

        // then (期待する結果):
        assert!(closed);
        assert!(connection.is_closed());
        assert_eq!(
            handler.events(),
            vec![Event::Close(connection.id().clone())]
        );
    }

    #[test]
    fn test_expire_while_holding_keeps_connection() {
        // テスト項目: 保持中にタイマーが発火しても close されない
        // given (前提条件):
        let (mut connection, _handler, _scheduler) = new_connection();
        let (tx, _rx) = responder(1);
        connection.poll_response(tx, true);

        // when (操作):
        let closed = connection.expire(1);

        // then (期待する結果):
        assert!(!closed);
        assert!(!connection.is_closed());
        assert!(connection.is_holding());
    }

    #[test]
    fn test_stale_expire_is_ignored() {
        // テスト項目: 再起動前の古いタイマーの発火は無視される
        // given (前提条件):
        let (mut connection, _handler, _scheduler) = new_connection();
        let (tx, _rx) = responder(1);
        connection.poll_response(tx, true);
        connection.close_response(ResponseToken::new(1)); // rearm -> generation 2

        // when (操作):
        let closed = connection.expire(1);

        // then (期待する結果):
        assert!(!closed);
        assert!(!connection.is_closed());
    }

    #[test]
    fn test_expire_after_close_is_ignored() {
        // テスト項目: close 後のタイマー発火は何もしない
        // given (前提条件):
        let (mut connection, handler, _scheduler) = new_connection();
        connection.close();

        // when (操作):
        let closed = connection.expire(1);

        // then (期待する結果):
        assert!(!closed);
        assert_eq!(handler.events().len(), 1);
    }

    #[test]
    fn test_outbound_overflow_drops_and_schedules_close_once() {
        // テスト項目: 送信キューの上限を超えるとメッセージを破棄し close を 1 回だけ予約する
        // given (前提条件):
        let handler = Arc::new(RecordingHandler::default());
        let scheduler = Arc::new(RecordingScheduler::default());
        let mut ctx = context(handler, scheduler.clone());
        ctx.settings.max_outbound = 2;
        let mut connection = Connection::new(SessionId::new("slow".to_string()).unwrap(), ctx);

        // when (操作):
        for i in 0..5 {
            connection.send("tick", json!(i));
        }

        // then (期待する結果):
        assert_eq!(connection.pending(), 2);
        assert_eq!(
            scheduler.tasks(),
            vec![Task::Close(connection.id().clone())]
        );
        assert!(!connection.is_closed());
    }

    #[test]
    fn test_received_message_invokes_handler() {
        // テスト項目: 受信メッセージがアプリケーションのハンドラに渡される
        // given (前提条件):
        let (mut connection, handler, _scheduler) = new_connection();

        // when (操作):
        connection.received_message("hello", json!({"name": "alice"}));

        // then (期待する結果):
        assert_eq!(
            handler.events(),
            vec![Event::Message(
                connection.id().clone(),
                "hello".to_string(),
                json!({"name": "alice"})
            )]
        );
    }
}
