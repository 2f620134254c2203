//! S7 (§8 Testable properties): a ghost presence entry — a user whose
//! presence record still claims a room but who has no live Hub client
//! anywhere, the way a crashed instance would leave things — gets evicted
//! by `Maintenance::reconcile_once`, and a real, still-connected client in
//! that room observes the eviction's `user:room_leave` notification land
//! on the wire.
//!
//! The ghost itself is never given a real WebSocket connection; its
//! presence and room-audience membership are written directly against
//! `AppState`'s stores, mirroring how `turntable-core`'s own
//! `maintenance.rs` unit tests set up a crashed-instance scenario, and
//! avoiding the need to simulate an actual mid-flight server crash over a
//! live socket.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::json;
use server::AppState;
use turntable_core::Maintenance;
use turntable_protocol::UserId;
use turntable_test_utils::{request, WsTestClient};

async fn start_server() -> (SocketAddr, AppState) {
    let state = AppState::new().await;
    let router = server::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("failed to bind test server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server error");
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    (addr, state)
}

async fn register(client: &mut WsTestClient, username: &str) {
    client.send(&request("user.register", json!({"username": username, "email": format!("{username}@example.test"), "password": "correct horse battery staple"}), Some(1))).await.unwrap();
    client.recv().await.unwrap();
}

#[tokio::test]
async fn s7_a_ghost_presence_entry_is_evicted_and_observed_by_a_live_room_member() {
    let (addr, state) = start_server().await;
    let url = format!("ws://{addr}/ws");

    let mut a = WsTestClient::connect(&url).await.unwrap();
    register(&mut a, "s7-witness").await;

    a.send(&request("room.create", json!({"slug": "s7-room", "name": "s7-room", "description": "", "settings": {"capacity": 10}}), Some(2))).await.unwrap();
    let room_id = a.recv().await.unwrap()["result"]["id"].as_str().unwrap().to_owned();

    a.send(&request("room.join", json!({"roomId": room_id}), Some(3))).await.unwrap();
    a.recv().await.unwrap();
    a.recv_timeout(Duration::from_millis(500)).await.unwrap(); // A's own user:room_join echo

    let room_id = room_id.parse().expect("room id string parses back into a RoomId");

    // The ghost never opens a socket: its room membership and presence are
    // written directly, simulating a peer instance that joined it to the
    // room then crashed before tearing anything down.
    let ghost = UserId::from("s7-ghost");
    state.rooms.join(&room_id, &ghost).await.expect("ghost joins the room directly");
    state.presence.touch(&ghost, Some(room_id)).await.expect("ghost presence is recorded");

    let witness_sees_ghost_join = a.recv_timeout(Duration::from_millis(500)).await.unwrap();
    assert_eq!(witness_sees_ghost_join["method"], "user:room_join");
    assert_eq!(witness_sees_ghost_join["params"]["userId"], "s7-ghost");

    let maintenance = Maintenance::new(state.presence.clone(), state.rooms.clone(), state.hub.clone());
    maintenance.reconcile_once().await;

    // Eviction goes through the same `leave` path a graceful departure
    // does: `remove_from_queue` runs unconditionally and broadcasts its
    // own `queue:updated` ahead of `user:room_leave`, even though the
    // ghost was never queued.
    let witness_sees_queue_updated = a.recv_timeout(Duration::from_millis(500)).await.unwrap();
    assert_eq!(witness_sees_queue_updated["method"], "queue:updated");
    let witness_sees_ghost_leave = a.recv_timeout(Duration::from_millis(500)).await.unwrap();
    assert_eq!(witness_sees_ghost_leave["method"], "user:room_leave");
    assert_eq!(witness_sees_ghost_leave["params"]["userId"], "s7-ghost");

    assert!(!state.rooms.is_user_in_room(&room_id, &ghost).await, "the ghost must no longer be counted as a room member");

    a.send(&request("room.getUsers", json!({"roomId": room_id}), Some(4))).await.unwrap();
    let users = a.recv().await.unwrap();
    let remaining: Vec<&str> = users["result"]["users"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
    assert_eq!(remaining, vec!["s7-witness"]);
}
