// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::future_not_send,
    clippy::missing_panics_doc
)]

//! Outbound commands as seen by the server.

mod support;

use std::time::Duration;

use agileparty::net::NetEvent;
use agileparty::transport::machine::ConnectionState::{Connected, Disconnected};
use agileparty_proto::task::TaskId;
use serde_json::json;

use support::{
    EventServer, assert_no_event, dead_url, fast_config, joined, room_json, snapshot_server,
    start_session, wait_for_event, wait_for_state,
};

#[tokio::test]
async fn connection_uri_carries_room_user_and_nickname() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) = snapshot_server(room_json(&[])).await;
    let mut config = fast_config(&server.url);
    config.nickname = "Alice Smith".to_string();

    let (_handle, mut events) = start_session(config, &api_url);
    let conn = server.accept().await;
    wait_for_state(&mut events, Connected).await;
    assert_eq!(conn.uri, "/ws/rooms/r1?userId=u1&nickname=Alice+Smith");
}

#[tokio::test]
async fn every_command_is_framed_as_type_and_payload() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) = snapshot_server(room_json(&[("u1", "Alice", false)])).await;
    let (handle, _events, mut conn) = joined(&mut server, &api_url).await;

    handle.vote("8").await.unwrap();
    handle.reveal().await.unwrap();
    handle.clear().await.unwrap();
    handle.rename("Ally").await.unwrap();
    handle.set_task("Estimate the login epic").await.unwrap();
    handle.create_task("Login page").await.unwrap();
    handle.update_task(TaskId::new("t1"), "Login form").await.unwrap();
    handle.reorder(vec![TaskId::new("t2"), TaskId::new("t1")]).await.unwrap();
    handle.set_active_task(TaskId::new("t2")).await.unwrap();
    handle.delete_task(TaskId::new("t1")).await.unwrap();

    let expected = [
        json!({"type": "vote", "payload": {"value": "8"}}),
        json!({"type": "reveal", "payload": {}}),
        json!({"type": "clear", "payload": {}}),
        json!({"type": "update_nickname", "payload": {"nickname": "Ally"}}),
        json!({"type": "set_task", "payload": {"description": "Estimate the login epic"}}),
        json!({"type": "create_task", "payload": {"headline": "Login page"}}),
        json!({"type": "update_task", "payload": {"taskId": "t1", "headline": "Login form"}}),
        json!({"type": "reorder_tasks", "payload": {"taskIds": ["t2", "t1"]}}),
        json!({"type": "set_active_task", "payload": {"taskId": "t2"}}),
        json!({"type": "delete_task", "payload": {"taskId": "t1"}}),
    ];
    for want in expected {
        assert_eq!(conn.recv_command().await, want);
    }
}

#[tokio::test]
async fn commands_while_disconnected_are_dropped_not_queued() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) = snapshot_server(room_json(&[])).await;
    let mut config = fast_config(&dead_url().await);
    config.reconnect.max_attempts = 0;

    let (handle, mut events) = start_session(config, &api_url);
    wait_for_event(&mut events, "give-up", |e| matches!(e, NetEvent::ReconnectFailed)).await;

    handle.vote("5").await.unwrap();
    let evt = wait_for_event(&mut events, "CommandDropped", |e| {
        matches!(e, NetEvent::CommandDropped(_))
    })
    .await;
    assert_eq!(evt, NetEvent::CommandDropped("vote"));

    // Nothing was buffered for a later connection.
    let (handle, mut events, mut conn) = joined(&mut server, &api_url).await;
    handle.reveal().await.unwrap();
    assert_eq!(
        conn.recv_command().await,
        json!({"type": "reveal", "payload": {}})
    );
    assert_no_event(&mut events, Duration::from_millis(100), "drop", |e| {
        matches!(e, NetEvent::CommandDropped(_))
    })
    .await;
}

#[tokio::test]
async fn disconnect_sends_normal_close_and_stays_down() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) = snapshot_server(room_json(&[])).await;
    let (handle, mut events, mut conn) = joined(&mut server, &api_url).await;

    handle.disconnect().await.unwrap();
    assert_eq!(conn.recv_close_code().await, Some(1000));
    wait_for_state(&mut events, Disconnected).await;
    server.assert_no_connection(Duration::from_millis(400)).await;

    handle.clear().await.unwrap();
    let evt = wait_for_event(&mut events, "CommandDropped", |e| {
        matches!(e, NetEvent::CommandDropped(_))
    })
    .await;
    assert_eq!(evt, NetEvent::CommandDropped("clear"));

    handle.connect().await.unwrap();
    let _again = server.accept().await;
    wait_for_state(&mut events, Connected).await;
}

#[tokio::test]
async fn dropping_the_handle_closes_normally() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) = snapshot_server(room_json(&[])).await;
    let (handle, _events, mut conn) = joined(&mut server, &api_url).await;

    drop(handle);
    assert_eq!(conn.recv_close_code().await, Some(1000));
}
