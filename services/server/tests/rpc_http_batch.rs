//! Exercises `POST /rpc` (§4.A's request/response transport alongside the
//! realtime `/ws` one): a bare request, a batch array, an empty-batch
//! rejection, an all-notification batch answering with no body, and
//! bearer-token auth mirroring the WebSocket handshake.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::json;
use server::AppState;

async fn start_server() -> SocketAddr {
    let state = AppState::new().await;
    let router = server::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("failed to bind test server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server error");
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    addr
}

#[tokio::test]
async fn a_single_request_returns_a_bare_response() {
    let addr = start_server().await;
    let client = reqwest::Client::new();

    let body = json!({"jsonrpc": "2.0", "method": "ping", "params": {}, "id": 1});
    let response: serde_json::Value = client.post(format!("http://{addr}/rpc")).json(&body).send().await.unwrap().json().await.unwrap();

    assert_eq!(response["result"], "pong");
    assert_eq!(response["id"], 1);
}

#[tokio::test]
async fn a_batch_array_returns_an_array_of_responses_in_order() {
    let addr = start_server().await;
    let client = reqwest::Client::new();

    let body = json!([
        {"jsonrpc": "2.0", "method": "ping", "params": {}, "id": 1},
        {"jsonrpc": "2.0", "method": "ping", "params": {}, "id": 2},
    ]);
    let response = client.post(format!("http://{addr}/rpc")).json(&body).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let responses: Vec<serde_json::Value> = response.json().await.unwrap();

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[1]["id"], 2);
    assert!(responses.iter().all(|r| r["result"] == "pong"));
}

#[tokio::test]
async fn an_empty_batch_is_rejected_as_invalid_request() {
    let addr = start_server().await;
    let client = reqwest::Client::new();

    let response: serde_json::Value = client.post(format!("http://{addr}/rpc")).json(&json!([])).send().await.unwrap().json().await.unwrap();

    assert_eq!(response["error"]["code"], -32600);
}

#[tokio::test]
async fn an_all_notification_batch_returns_no_content() {
    let addr = start_server().await;
    let client = reqwest::Client::new();

    let body = json!([{"jsonrpc": "2.0", "method": "ping", "params": {}}]);
    let response = client.post(format!("http://{addr}/rpc")).json(&body).send().await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn a_protected_method_without_a_bearer_token_is_rejected() {
    let addr = start_server().await;
    let client = reqwest::Client::new();

    let body = json!({"jsonrpc": "2.0", "method": "playlist.create", "params": {"name": "X"}, "id": 1});
    let response: serde_json::Value = client.post(format!("http://{addr}/rpc")).json(&body).send().await.unwrap().json().await.unwrap();

    assert_eq!(response["error"]["code"], -32001);
}

#[tokio::test]
async fn a_bearer_token_from_registration_authenticates_a_later_request_on_the_same_transport() {
    let addr = start_server().await;
    let client = reqwest::Client::new();

    let register_body = json!({
        "jsonrpc": "2.0",
        "method": "user.register",
        "params": {"username": "rpc-http-user", "email": "rpc-http-user@example.test", "password": "correct horse battery staple"},
        "id": 1,
    });
    let register_response: serde_json::Value = client.post(format!("http://{addr}/rpc")).json(&register_body).send().await.unwrap().json().await.unwrap();
    let token = register_response["result"]["token"].as_str().expect("register response carries a token").to_owned();

    let playlist_body = json!({"jsonrpc": "2.0", "method": "playlist.create", "params": {"name": "My Playlist"}, "id": 2});
    let playlist_response: serde_json::Value = client
        .post(format!("http://{addr}/rpc"))
        .bearer_auth(token)
        .json(&playlist_body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(playlist_response["result"].is_object(), "an authenticated call should succeed: {playlist_response}");
}
