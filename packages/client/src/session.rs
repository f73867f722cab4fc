//! Long-polling client session management.

use kayoi_server::{
    chat::{CHAT, ChatIn, HELLO, HelloIn},
    domain::Message,
};
use kayoi_shared::time::unix_millis;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{error::ClientError, transport::LongPollClient};

use super::{formatter::MessageFormatter, ui::redisplay_prompt};

/// Run one chat session until the user exits or the session is lost.
pub async fn run_client_session(url: &str, name: &str) -> Result<(), ClientError> {
    let client = LongPollClient::connect(url).await?;
    let greeting = client
        .send(vec![Message::new(HELLO, payload(&HelloIn { name: name.to_string() })?)])
        .await?;
    display(&greeting, name);

    tracing::info!("Connected to chat server as session '{}'", client.session_id());
    println!(
        "\nYou are '{}'. Type messages and press Enter to send. Press Ctrl+C to exit.\n",
        name
    );

    // Poll loop: one request held open at a time
    let poller = client.clone();
    let name_for_poll = name.to_string();
    let mut poll_task = tokio::spawn(async move {
        loop {
            match poller.poll().await {
                Ok(messages) => display(&messages, &name_for_poll),
                Err(e) => return Err::<(), ClientError>(e),
            }
        }
    });

    // Create channel for rustyline input
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // Spawn a blocking thread for rustyline (synchronous readline)
    let prompt = format!("{}> ", name);
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            // Channel closed, exit thread
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    // Post each input line as a chat message
    let sender = client.clone();
    let name_for_write = name.to_string();
    let mut write_task = tokio::spawn(async move {
        while let Some(line) = input_rx.recv().await {
            let message = Message::new(CHAT, payload(&ChatIn { text: line })?);
            let backlog = sender.send(vec![message]).await?;

            print!("\n{}", MessageFormatter::format_sent_confirmation(unix_millis()));
            display(&backlog, &name_for_write);
            redisplay_prompt(&name_for_write);
        }
        Ok::<(), ClientError>(())
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        poll_result = &mut poll_task => {
            write_task.abort();
            flatten(poll_result)
        }
        write_result = &mut write_task => {
            poll_task.abort();
            flatten(write_result)?;
            // User exit: leave the room instead of waiting for the timeout
            if let Err(e) = client.close().await {
                tracing::warn!("Failed to close session: {}", e);
            }
            Ok(())
        }
    }
}

fn display(messages: &[Message], name: &str) {
    if messages.is_empty() {
        return;
    }
    for message in messages {
        print!("{}", MessageFormatter::format_message(message, name));
    }
    redisplay_prompt(name);
}

fn payload<T: serde::Serialize>(value: &T) -> Result<Value, ClientError> {
    Ok(serde_json::to_value(value)?)
}

fn flatten(
    result: Result<Result<(), ClientError>, tokio::task::JoinError>,
) -> Result<(), ClientError> {
    match result {
        Ok(result) => result,
        Err(e) => Err(ClientError::ConnectionError(format!("task failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_payload_encodes_chat() {
        // テスト項目: チャット本文が JSON ペイロードに変換される
        // given (前提条件):
        let chat = ChatIn {
            text: "hi".to_string(),
        };

        // when (操作):
        let result = payload(&chat);

        // then (期待する結果):
        assert_eq!(result.unwrap(), serde_json::json!({"text": "hi"}));
    }

    #[test]
    fn test_payload_reports_encode_error() {
        // テスト項目: JSON に変換できない値は Encode エラーになる
        // given (前提条件):
        let mut unencodable = HashMap::new();
        unencodable.insert((1, 2), 3);

        // when (操作):
        let result = payload(&unencodable);

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::Encode(_))));
    }
}
