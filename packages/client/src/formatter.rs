//! Message formatting utilities for client display.

use kayoi_server::{
    chat::{CHAT, ChatOut, JOINED, LEFT, MEMBERS, MembersOut, PresenceOut},
    domain::Message,
};
use kayoi_shared::time::millis_to_jst_rfc3339;
use serde::de::DeserializeOwned;

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format any message received from the room.
    ///
    /// Messages with an unknown name or an unexpected payload are shown raw.
    pub fn format_message(message: &Message, current_name: &str) -> String {
        let formatted = match message.name.as_str() {
            MEMBERS => parse::<MembersOut>(message)
                .map(|members| Self::format_members(&members.names, current_name)),
            JOINED => parse::<PresenceOut>(message)
                .map(|joined| Self::format_participant_joined(&joined.name, joined.at)),
            LEFT => parse::<PresenceOut>(message)
                .map(|left| Self::format_participant_left(&left.name, left.at)),
            CHAT => parse::<ChatOut>(message)
                .map(|chat| Self::format_chat_message(&chat.name, &chat.text, chat.timestamp)),
            _ => None,
        };
        formatted.unwrap_or_else(|| Self::format_raw_message(message))
    }

    /// Format the member list sent in reply to `hello`
    pub fn format_members(names: &[String], current_name: &str) -> String {
        let mut output = String::new();
        output.push_str("\n\n============================================================\n");
        output.push_str("Participants:\n");

        if names.is_empty() {
            output.push_str("(No participants)\n");
        } else {
            for name in names {
                let me_suffix = if name == current_name { " (me)" } else { "" };
                output.push_str(&format!("{}{}\n", name, me_suffix));
            }
        }

        output.push_str("============================================================\n");
        output
    }

    /// Format a participant-joined notification
    pub fn format_participant_joined(name: &str, at: i64) -> String {
        format!("\n+ {} entered at {}\n", name, millis_to_jst_rfc3339(at))
    }

    /// Format a participant-left notification
    pub fn format_participant_left(name: &str, at: i64) -> String {
        format!("\n- {} left at {}\n", name, millis_to_jst_rfc3339(at))
    }

    /// Format a chat message
    ///
    /// # Arguments
    ///
    /// * `from` - Display name of the sender
    /// * `text` - The message text
    /// * `sent_at` - Unix timestamp when the server relayed it (milliseconds)
    pub fn format_chat_message(from: &str, text: &str, sent_at: i64) -> String {
        format!(
            "\n\n------------------------------------------------------------\n\
             @{}: {}\n\
             sent at {}\n\
             ------------------------------------------------------------\n",
            from,
            text,
            millis_to_jst_rfc3339(sent_at)
        )
    }

    /// Format a confirmation message after sending
    pub fn format_sent_confirmation(sent_at: i64) -> String {
        format!("sent at {}\n", millis_to_jst_rfc3339(sent_at))
    }

    /// Format a message this client does not understand
    pub fn format_raw_message(message: &Message) -> String {
        format!("\n← Received: {} {}\n", message.name, message.payload)
    }
}

fn parse<T: DeserializeOwned>(message: &Message) -> Option<T> {
    serde_json::from_value(message.payload.clone()).ok()
}
