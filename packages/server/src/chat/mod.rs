//! Demo application: a single chat room on top of the multiplexer.

mod payload;
mod room;

pub use payload::{
    CHAT, ChatIn, ChatOut, HELLO, HelloIn, JOINED, LEFT, MEMBERS, MembersOut, PresenceOut,
};
pub use room::ChatRoom;
