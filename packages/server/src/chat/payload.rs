//! Message payloads of the chat room.
//!
//! | direction | name      | payload          |
//! |-----------|-----------|------------------|
//! | in        | `hello`   | [`HelloIn`]      |
//! | in        | `chat`    | [`ChatIn`]       |
//! | out       | `members` | [`MembersOut`]   |
//! | out       | `joined`  | [`PresenceOut`]  |
//! | out       | `left`    | [`PresenceOut`]  |
//! | out       | `chat`    | [`ChatOut`]      |

use serde::{Deserialize, Serialize};

pub const HELLO: &str = "hello";
pub const CHAT: &str = "chat";
pub const MEMBERS: &str = "members";
pub const JOINED: &str = "joined";
pub const LEFT: &str = "left";

/// Announces the sender's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloIn {
    pub name: String,
}

/// A chat line from the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatIn {
    pub text: String,
}

/// Names present in the room, sent in reply to `hello`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembersOut {
    pub names: Vec<String>,
}

/// Someone entered or left. `at` is Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceOut {
    pub name: String,
    pub at: i64,
}

/// A chat line relayed to the other members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatOut {
    pub name: String,
    pub text: String,
    pub timestamp: i64,
}
