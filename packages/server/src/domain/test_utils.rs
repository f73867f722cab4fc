//! Fakes for exercising the state machine without a runtime.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use kayoi_shared::time::FixedClock;
use serde_json::Value;
use tokio::sync::oneshot;

use super::{
    Connection, ConnectionContext, ConnectionHandler, ConnectionSettings, Message, PollResponse,
    Responder, ResponseToken, Scheduler, SessionId, Task, TimerHandle,
};

pub const TEST_NOW: i64 = 1_000;

/// Records scheduled tasks and armed timers instead of running them.
#[derive(Default)]
pub struct RecordingScheduler {
    tasks: Mutex<VecDeque<Task>>,
    timers: Mutex<Vec<(SessionId, u64, Duration)>>,
}

impl RecordingScheduler {
    pub fn pop(&self) -> Option<Task> {
        self.tasks.lock().unwrap().pop_front()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().iter().cloned().collect()
    }

    pub fn timers(&self) -> Vec<(SessionId, u64, Duration)> {
        self.timers.lock().unwrap().clone()
    }

    /// Generation of the most recently armed timer for `id`.
    pub fn last_generation(&self, id: &SessionId) -> Option<u64> {
        self.timers
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(timer_id, _, _)| timer_id == id)
            .map(|(_, generation, _)| *generation)
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule(&self, task: Task) {
        self.tasks.lock().unwrap().push_back(task);
    }

    fn start_timer(&self, id: &SessionId, generation: u64, after: Duration) -> TimerHandle {
        self.timers
            .lock()
            .unwrap()
            .push((id.clone(), generation, after));
        TimerHandle::detached(generation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connect(SessionId),
    Message(SessionId, String, Value),
    Close(SessionId),
}

/// Records callbacks, with a few scripted reactions.
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<Event>>,
    close_on: Mutex<Option<String>>,
    greeting: Mutex<Option<Message>>,
}

impl RecordingHandler {
    /// Close the connection from inside `on_message` when `message` arrives.
    pub fn close_on(self, message: &str) -> Self {
        *self.close_on.lock().unwrap() = Some(message.to_string());
        self
    }

    /// Send `message` from inside `on_connect`.
    pub fn greet_with(self, message: Message) -> Self {
        *self.greeting.lock().unwrap() = Some(message);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Message(_, name, _) => Some(name),
                _ => None,
            })
            .collect()
    }
}

impl ConnectionHandler for RecordingHandler {
    fn on_connect(&self, connection: &mut Connection) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Connect(connection.id().clone()));
        let greeting = self.greeting.lock().unwrap().clone();
        if let Some(greeting) = greeting {
            connection.send(&greeting.name, greeting.payload);
        }
    }

    fn on_message(&self, connection: &mut Connection, message: &str, payload: Value) {
        self.events.lock().unwrap().push(Event::Message(
            connection.id().clone(),
            message.to_string(),
            payload,
        ));
        let close_on = self.close_on.lock().unwrap().clone();
        if close_on.as_deref() == Some(message) {
            connection.close();
        }
    }

    fn on_close(&self, connection: &mut Connection) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Close(connection.id().clone()));
    }
}

pub fn context(
    handler: Arc<dyn ConnectionHandler>,
    scheduler: Arc<dyn Scheduler>,
) -> ConnectionContext {
    ConnectionContext {
        handler,
        scheduler,
        clock: Arc::new(FixedClock::new(TEST_NOW)),
        settings: ConnectionSettings::default(),
    }
}

pub fn responder(token: u64) -> (Responder, oneshot::Receiver<PollResponse>) {
    Responder::channel(ResponseToken::new(token))
}
