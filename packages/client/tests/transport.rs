//! Integration tests for `LongPollClient` against an in-process server.

use std::{sync::Arc, time::Duration};

use kayoi_client::{ClientError, LongPollClient};
use kayoi_server::{
    chat::{CHAT, ChatRoom, HELLO, JOINED, MEMBERS},
    domain::Message,
    infrastructure::event_loop::{MultiplexerHandle, spawn_multiplexer},
    ui::{ServerConfig, build_router},
    usecase::MultiplexerConfig,
};
use kayoi_shared::time::{Clock, SystemClock};
use serde_json::json;

/// Start a chat server on an ephemeral port and return its poll URL.
async fn start_server() -> (String, MultiplexerHandle) {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let room = Arc::new(ChatRoom::new(clock.clone()));
    let (multiplexer, _task) = spawn_multiplexer(MultiplexerConfig::default(), room, clock);
    let app = build_router(multiplexer.clone(), ServerConfig::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/poll", addr), multiplexer)
}

async fn wait_until_holding(multiplexer: &MultiplexerHandle, count: usize) {
    while multiplexer.stats().await.unwrap().holding != count {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_connect_opens_distinct_sessions() {
    // テスト項目: connect ごとに異なるセッションが開かれる
    // given (前提条件):
    let (url, multiplexer) = start_server().await;

    // when (操作):
    let alice = LongPollClient::connect(&url).await.unwrap();
    let bob = LongPollClient::connect(&url).await.unwrap();

    // then (期待する結果):
    assert_ne!(alice.session_id(), bob.session_id());
    assert_eq!(multiplexer.stats().await.unwrap().open, 2);
}

#[tokio::test]
async fn test_send_returns_backlog_and_poll_receives_broadcast() {
    // テスト項目: send の応答に溜まったメッセージが返り、保持中の poll に他者のチャットが届く
    // given (前提条件):
    let (url, multiplexer) = start_server().await;
    let alice = LongPollClient::connect(&url).await.unwrap();
    let bob = LongPollClient::connect(&url).await.unwrap();
    alice
        .send(vec![Message::new(HELLO, json!({"name": "alice"}))])
        .await
        .unwrap();
    let bob_backlog = bob
        .send(vec![Message::new(HELLO, json!({"name": "bob"}))])
        .await
        .unwrap();

    let bob_members = bob.poll().await.unwrap();

    // when (操作):
    let poller = bob.clone();
    let held = tokio::spawn(async move { poller.poll().await });
    wait_until_holding(&multiplexer, 1).await;
    alice
        .send(vec![Message::new(CHAT, json!({"text": "hi"}))])
        .await
        .unwrap();
    let received = held.await.unwrap().unwrap();

    // then (期待する結果):
    assert_eq!(bob_backlog[0].name, JOINED);
    assert_eq!(
        bob_members,
        vec![Message::new(MEMBERS, json!({"names": ["alice", "bob"]}))]
    );
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].name, CHAT);
    assert_eq!(received[0].payload["name"], json!("alice"));
    assert_eq!(received[0].payload["text"], json!("hi"));
}

#[tokio::test]
async fn test_superseded_poll_returns_empty() {
    // テスト項目: 同じセッションの新しい poll に置き換えられた poll は空で返る
    // given (前提条件):
    let (url, multiplexer) = start_server().await;
    let client = LongPollClient::connect(&url).await.unwrap();
    let first = client.clone();
    let first = tokio::spawn(async move { first.poll().await });
    wait_until_holding(&multiplexer, 1).await;

    // when (操作):
    let second = client.clone();
    let _second = tokio::spawn(async move { second.poll().await });

    // then (期待する結果):
    assert!(first.await.unwrap().unwrap().is_empty());
}

#[tokio::test]
async fn test_poll_after_close_reports_session_closed() {
    // テスト項目: close 後の poll は SessionClosed エラーになる
    // given (前提条件):
    let (url, _multiplexer) = start_server().await;
    let client = LongPollClient::connect(&url).await.unwrap();

    // when (操作):
    client.close().await.unwrap();
    let result = client.poll().await;

    // then (期待する結果):
    assert!(matches!(result, Err(ClientError::SessionClosed(id)) if id == client.session_id().as_str()));
}

#[tokio::test]
async fn test_connect_to_missing_endpoint_fails_with_status() {
    // テスト項目: 存在しないエンドポイントへの connect はステータスエラーになる
    // given (前提条件):
    let (url, _multiplexer) = start_server().await;
    let missing = url.replace("/poll", "/nope");

    // when (操作):
    let result = LongPollClient::connect(&missing).await;

    // then (期待する結果):
    assert!(matches!(result, Err(ClientError::Status(404))));
}
