//! Chat room [`ConnectionHandler`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use kayoi_shared::time::Clock;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::domain::{Connection, ConnectionHandle, ConnectionHandler, SessionId};

use super::payload::{
    CHAT, ChatIn, ChatOut, HELLO, HelloIn, JOINED, LEFT, MEMBERS, MembersOut, PresenceOut,
};

const ANONYMOUS: &str = "anonymous";

struct Member {
    name: Option<String>,
    handle: ConnectionHandle,
}

/// Relays chat lines between every open connection.
pub struct ChatRoom {
    members: Mutex<HashMap<SessionId, Member>>,
    clock: Arc<dyn Clock>,
}

impl ChatRoom {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            members: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of connections currently in the room.
    pub fn member_count(&self) -> usize {
        self.members().len()
    }

    fn members(&self) -> MutexGuard<'_, HashMap<SessionId, Member>> {
        // Callbacks run one at a time; a poisoned lock only means an earlier
        // callback panicked, the map itself is still consistent.
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hello(&self, connection: &mut Connection, hello: HelloIn) {
        let at = self.clock.now_millis();
        let names = {
            let mut members = self.members();
            if let Some(member) = members.get_mut(connection.id()) {
                member.name = Some(hello.name.clone());
            }
            let mut names: Vec<String> = members
                .values()
                .filter_map(|member| member.name.clone())
                .collect();
            names.sort();
            broadcast(
                &members,
                connection.id(),
                JOINED,
                &PresenceOut {
                    name: hello.name.clone(),
                    at,
                },
            );
            names
        };

        tracing::info!("'{}' joined the room", hello.name);
        if let Some(payload) = to_payload(&MembersOut { names }) {
            connection.send(MEMBERS, payload);
        }
    }

    fn chat(&self, connection: &Connection, chat: ChatIn) {
        let members = self.members();
        let name = members
            .get(connection.id())
            .and_then(|member| member.name.clone())
            .unwrap_or_else(|| ANONYMOUS.to_string());
        broadcast(
            &members,
            connection.id(),
            CHAT,
            &ChatOut {
                name,
                text: chat.text,
                timestamp: self.clock.now_millis(),
            },
        );
    }
}

impl ConnectionHandler for ChatRoom {
    fn on_connect(&self, connection: &mut Connection) {
        self.members().insert(
            connection.id().clone(),
            Member {
                name: None,
                handle: connection.handle(),
            },
        );
    }

    fn on_message(&self, connection: &mut Connection, message: &str, payload: Value) {
        match message {
            HELLO => {
                if let Some(hello) = from_payload::<HelloIn>(message, payload) {
                    self.hello(connection, hello);
                }
            }
            CHAT => {
                if let Some(chat) = from_payload::<ChatIn>(message, payload) {
                    self.chat(connection, chat);
                }
            }
            other => tracing::debug!("Ignoring unknown message '{}'", other),
        }
    }

    fn on_close(&self, connection: &mut Connection) {
        let mut members = self.members();
        let Some(member) = members.remove(connection.id()) else {
            return;
        };
        if let Some(name) = member.name {
            tracing::info!("'{}' left the room", name);
            let at = self.clock.now_millis();
            broadcast(&members, connection.id(), LEFT, &PresenceOut { name, at });
        }
    }
}

/// Send to every member except `from`.
fn broadcast<T: Serialize>(
    members: &HashMap<SessionId, Member>,
    from: &SessionId,
    message: &str,
    payload: &T,
) {
    let Some(payload) = to_payload(payload) else {
        return;
    };
    for (id, member) in members.iter() {
        if id != from {
            member.handle.send(message, payload.clone());
        }
    }
}

fn from_payload<T: DeserializeOwned>(message: &str, payload: Value) -> Option<T> {
    match serde_json::from_value(payload) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!("Invalid '{}' payload: {}", message, e);
            None
        }
    }
}

fn to_payload<T: Serialize>(payload: &T) -> Option<Value> {
    match serde_json::to_value(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!("Failed to serialize payload: {}", e);
            None
        }
    }
}
