// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::future_not_send,
    clippy::missing_panics_doc,
    clippy::float_cmp
)]

//! Room state reconciliation over a live event stream.
//!
//! Every session starts from the snapshot fetched on open. The tests then
//! push events from the server side and check the published room state.

mod support;

use std::time::Duration;

use agileparty::net::NetEvent;
use agileparty::room::{average_display, vote_counts};
use agileparty_proto::room::UserId;
use serde_json::json;

use support::{
    EventServer, assert_no_event, joined, next_room, room_json, snapshot_server, wait_for_event,
};

#[tokio::test]
async fn vote_submitted_patches_without_refetch() {
    let mut server = EventServer::start().await;
    let (api_url, snapshot) =
        snapshot_server(room_json(&[("u1", "Alice", false), ("u2", "Bob", false)])).await;
    let (_handle, mut events, mut conn) = joined(&mut server, &api_url).await;

    conn.send_event("vote_submitted", json!({"userId": "u2", "hasVoted": true}))
        .await;
    let state = next_room(&mut events).await;
    assert_eq!(state.users.len(), 2);
    assert!(!state.user(&UserId::new("u1")).unwrap().is_voted);
    assert!(state.user(&UserId::new("u2")).unwrap().is_voted);
    assert_eq!(snapshot.hits(), 1);
}

#[tokio::test]
async fn coarse_membership_events_refetch_the_snapshot() {
    let mut server = EventServer::start().await;
    let (api_url, snapshot) = snapshot_server(room_json(&[("u1", "Alice", false)])).await;
    let (_handle, mut events, mut conn) = joined(&mut server, &api_url).await;

    snapshot.set(room_json(&[("u1", "Alice", false), ("u2", "Bob", false)]));
    conn.send_event("user_joined", json!({"userId": "u2", "nickname": "Bob"}))
        .await;
    let state = next_room(&mut events).await;
    assert_eq!(state.users.len(), 2);

    snapshot.set(room_json(&[("u2", "Bobby", false)]));
    conn.send_event("user_updated", json!({"userId": "u2", "nickname": "Bobby"}))
        .await;
    conn.send_event("user_left", json!({"userId": "u1"})).await;
    let state = next_room(&mut events).await;
    assert_eq!(state.users.len(), 1);
    assert_eq!(state.users[0].name, "Bobby");
}

#[tokio::test]
async fn reveal_then_clear_round() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) =
        snapshot_server(room_json(&[("u1", "Alice", true), ("u2", "Bob", true)])).await;
    let (_handle, mut events, mut conn) = joined(&mut server, &api_url).await;

    conn.send_event(
        "votes_revealed",
        json!({
            "votes": [
                {"userId": "u1", "nickname": "Alice", "value": "5"},
                {"userId": "u2", "nickname": "Bob", "value": "8"},
                {"userId": "u9", "nickname": "Gone", "value": "13"}
            ],
            "average": 6.5
        }),
    )
    .await;
    let state = next_room(&mut events).await;
    assert!(state.is_revealed);
    assert_eq!(state.average, Some(6.5));
    assert_eq!(average_display(&state), "6.5");
    let counts: Vec<(String, usize)> = vote_counts(&state)
        .into_iter()
        .map(|c| (c.value, c.count))
        .collect();
    assert_eq!(counts, vec![("5".to_string(), 1), ("8".to_string(), 1)]);

    conn.send_event("votes_cleared", json!({})).await;
    let state = next_room(&mut events).await;
    assert!(!state.is_revealed);
    assert!(state.votes.is_empty());
    assert_eq!(state.average, None);
    assert!(state.users.iter().all(|u| !u.is_voted));
    assert_eq!(average_display(&state), "N/A");
}

#[tokio::test]
async fn room_state_frame_overwrites_local_state() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) = snapshot_server(room_json(&[("u1", "Alice", false)])).await;
    let (_handle, mut events, mut conn) = joined(&mut server, &api_url).await;

    conn.send_event(
        "room_state",
        json!({
            "roomId": "r1",
            "roomName": "Renamed",
            "users": [
                {"id": "u1", "name": "Alice", "isVoted": true},
                {"id": "u3", "name": "Cy", "isVoted": false}
            ],
            "votes": [],
            "isRevealed": false
        }),
    )
    .await;
    let state = next_room(&mut events).await;
    assert_eq!(state.room_name, "Renamed");
    let names: Vec<&str> = state.users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["Alice", "Cy"]);
}

#[tokio::test]
async fn failed_refetch_keeps_previous_state() {
    let mut server = EventServer::start().await;
    let (api_url, snapshot) =
        snapshot_server(room_json(&[("u1", "Alice", false), ("u2", "Bob", false)])).await;
    let (_handle, mut events, mut conn) = joined(&mut server, &api_url).await;

    snapshot.fail();
    conn.send_event("user_left", json!({"userId": "u2"})).await;
    let evt = wait_for_event(&mut events, "SnapshotFailed", |e| {
        matches!(e, NetEvent::SnapshotFailed(_))
    })
    .await;
    assert!(matches!(evt, NetEvent::SnapshotFailed(m) if m.contains("database unavailable")));

    conn.send_event("vote_submitted", json!({"userId": "u1", "hasVoted": true}))
        .await;
    let state = next_room(&mut events).await;
    assert_eq!(state.users.len(), 2);
    assert!(state.users[0].is_voted);
}

#[tokio::test]
async fn unknown_and_malformed_frames_are_skipped() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) = snapshot_server(room_json(&[("u1", "Alice", false)])).await;
    let (_handle, mut events, mut conn) = joined(&mut server, &api_url).await;

    conn.send_event("confetti", json!({"amount": 9000})).await;
    conn.send("{not json").await;
    assert_no_event(&mut events, Duration::from_millis(200), "state change", |e| {
        matches!(e, NetEvent::RoomUpdated(_) | NetEvent::ConnectionChanged { .. })
    })
    .await;

    conn.send_event("vote_submitted", json!({"userId": "u1", "hasVoted": true}))
        .await;
    assert!(next_room(&mut events).await.users[0].is_voted);
}

#[tokio::test]
async fn server_errors_are_surfaced() {
    let mut server = EventServer::start().await;
    let (api_url, _snapshot) = snapshot_server(room_json(&[("u1", "Alice", false)])).await;
    let (_handle, mut events, mut conn) = joined(&mut server, &api_url).await;

    conn.send_event("error", json!({"message": "Invalid vote value", "code": "INVALID_VOTE"}))
        .await;
    let evt = wait_for_event(&mut events, "ServerError", |e| {
        matches!(e, NetEvent::ServerError { .. })
    })
    .await;
    assert_eq!(
        evt,
        NetEvent::ServerError {
            message: "Invalid vote value".into(),
            code: Some("INVALID_VOTE".into()),
        }
    );
}
