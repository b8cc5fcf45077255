// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::future_not_send,
    clippy::missing_panics_doc
)]

//! Task backlog reconciliation over a live event stream, including the
//! active-task forward reference.

mod support;

use std::time::Duration;

use agileparty::config::ClientConfig;
use agileparty::net::NetEvent;
use agileparty::transport::machine::ConnectionState::Connected;
use serde_json::json;

use support::{
    EventServer, assert_no_event, fast_config, joined, next_room, next_tasks, room_json,
    snapshot_server, start_session, wait_for_state,
};

fn task(id: &str, headline: &str, position: i64) -> serde_json::Value {
    json!({"id": id, "headline": headline, "position": position})
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn backlog_follows_crud_events() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) = snapshot_server(room_json(&[])).await;
    let (_handle, mut events, mut conn) = joined(&mut server, &api_url).await;

    conn.send_event(
        "task_list_sync",
        json!({"tasks": [task("t2", "Logout", 2), task("t1", "Login", 1)]}),
    )
    .await;
    assert_eq!(next_tasks(&mut events).await, (ids(&["t1", "t2"]), None));

    conn.send_event("task_created", json!({"task": task("t3", "Signup", 3)}))
        .await;
    assert_eq!(next_tasks(&mut events).await.0, ids(&["t1", "t2", "t3"]));

    conn.send_event("tasks_reordered", json!({"taskIds": ["t3", "t1", "t2"]}))
        .await;
    assert_eq!(next_tasks(&mut events).await.0, ids(&["t3", "t1", "t2"]));

    conn.send_event("task_deleted", json!({"taskId": "t1"})).await;
    assert_eq!(next_tasks(&mut events).await.0, ids(&["t3", "t2"]));
}

#[tokio::test]
async fn duplicate_creation_is_absorbed() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) = snapshot_server(room_json(&[])).await;
    let (_handle, mut events, mut conn) = joined(&mut server, &api_url).await;

    conn.send_event("task_created", task("t1", "Login", 1)).await;
    assert_eq!(next_tasks(&mut events).await.0, ids(&["t1"]));

    conn.send_event("task_created", json!({"task": task("t1", "Login", 1)}))
        .await;
    assert_no_event(&mut events, Duration::from_millis(200), "task change", |e| {
        matches!(e, NetEvent::TasksUpdated { .. })
    })
    .await;
}

#[tokio::test]
async fn active_task_tracks_latest_attributes() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) = snapshot_server(room_json(&[])).await;
    let (_handle, mut events, mut conn) = joined(&mut server, &api_url).await;

    conn.send_event("task_list_sync", json!({"tasks": [task("t1", "Login", 1)]}))
        .await;
    next_tasks(&mut events).await;
    conn.send_event("active_task_set", json!({"taskId": "t1"})).await;
    assert_eq!(next_tasks(&mut events).await.1.as_deref(), Some("t1"));

    conn.send_event(
        "task_updated",
        json!({"task": {"id": "t1", "headline": "Login", "estimation": "8", "position": 1}}),
    )
    .await;
    let evt = support::wait_for_event(&mut events, "TasksUpdated", |e| {
        matches!(e, NetEvent::TasksUpdated { .. })
    })
    .await;
    let NetEvent::TasksUpdated { tasks, active } = evt else {
        unreachable!()
    };
    assert_eq!(active.unwrap().as_str(), "t1");
    assert_eq!(tasks[0].estimation.as_deref(), Some("8"));

    conn.send_event("task_deleted", json!({"taskId": "t1"})).await;
    assert_eq!(next_tasks(&mut events).await, (vec![], None));
}

#[tokio::test]
async fn forward_reference_resolves_when_task_arrives() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) = snapshot_server(room_json(&[])).await;
    let (_handle, mut events, mut conn) = joined(&mut server, &api_url).await;

    conn.send_event("active_task_set", json!({"taskId": "t9"})).await;
    assert_eq!(next_tasks(&mut events).await, (vec![], None));

    conn.send_event("task_created", json!({"task": task("t9", "Late", 1)}))
        .await;
    assert_eq!(
        next_tasks(&mut events).await,
        (ids(&["t9"]), Some("t9".to_string()))
    );
}

#[tokio::test]
async fn forward_reference_resolves_by_list_sync_within_default_retry() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) = snapshot_server(room_json(&[])).await;
    let mut config = fast_config(&server.url);
    config.active_task_retry = ClientConfig::default().active_task_retry;
    let (_handle, mut events) = start_session(config, &api_url);
    let mut conn = server.accept().await;
    wait_for_state(&mut events, Connected).await;
    next_room(&mut events).await;

    conn.send_event("active_task_set", json!({"taskId": "t9"})).await;
    assert_eq!(next_tasks(&mut events).await, (vec![], None));

    tokio::time::sleep(Duration::from_millis(100)).await;
    conn.send_event("task_list_sync", json!({"tasks": [task("t9", "Late", 1)]}))
        .await;
    assert_eq!(
        next_tasks(&mut events).await,
        (ids(&["t9"]), Some("t9".to_string()))
    );

    // The re-lookup still fires afterwards and finds nothing to change.
    assert_no_event(&mut events, Duration::from_millis(200), "task change", |e| {
        matches!(e, NetEvent::TasksUpdated { .. })
    })
    .await;
}

#[tokio::test]
async fn forward_reference_that_never_arrives_is_left_unset() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) = snapshot_server(room_json(&[])).await;
    let (_handle, mut events, mut conn) = joined(&mut server, &api_url).await;

    conn.send_event("active_task_set", json!({"taskId": "t9"})).await;
    assert_eq!(next_tasks(&mut events).await, (vec![], None));
    // The single delayed re-lookup fires and gives up.
    assert_eq!(next_tasks(&mut events).await, (vec![], None));

    // A late arrival is not promoted to active.
    conn.send_event("task_created", json!({"task": task("t9", "Late", 1)}))
        .await;
    assert_eq!(next_tasks(&mut events).await, (ids(&["t9"]), None));
}

#[tokio::test]
async fn clearing_the_active_task() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) = snapshot_server(room_json(&[])).await;
    let (_handle, mut events, mut conn) = joined(&mut server, &api_url).await;

    conn.send_event("task_list_sync", json!({"tasks": [task("t1", "Login", 1)]}))
        .await;
    next_tasks(&mut events).await;
    conn.send_event("active_task_set", json!({"taskId": "t1"})).await;
    next_tasks(&mut events).await;

    conn.send_event("active_task_set", json!({"taskId": null})).await;
    assert_eq!(next_tasks(&mut events).await, (ids(&["t1"]), None));
}
