//! WebSocket connection lifecycle: upgrade, handshake auth, read/write
//! pumps, teardown (§4.B Connection, §4.D Session server).
//!
//! Grounded on the `ws_forwarder.rs`/`ws_receiver.rs` split of "one task
//! owns the socket's write half, every other task only touches an
//! `mpsc::Sender`" — here the same shape drives one read pump (parses
//! JSON-RPC frames, dispatches through the router) and one write pump
//! (drains a [`Client`]'s outbound mailbox into the socket, and also owns
//! the heartbeat ticker) per connection, instead of a forwarder/receiver
//! pair per race stream. The heartbeat itself is the same
//! `tokio::time::interval` + `tokio::select!` shape `ws_forwarder.rs` uses
//! for its own ping loop.
//!
//! `GET /ws` carries an optional bearer token, either as `?token=...` or
//! an `Authorization: Bearer ...` header (§4.D step 2, "extracting the
//! bearer token from the URL query or an authorization header"). When
//! present it is resolved via
//! [`turntable_core::auth::AuthProvider::authenticate_token`] before the
//! connection is registered with the hub; a missing/expired token writes
//! a final JSON-RPC error frame and closes the socket with code 1008
//! (§4.D step 2). A connection opened with no token at all is accepted
//! unauthenticated — `user.login`/`user.register` are the only methods
//! the router lets an unauthenticated caller reach (§4.E), so a fresh
//! client can still complete its first login over the same socket it
//! will use afterward. Every subsequent frame resolves its claims from
//! the `Client`'s current user id, so a login mid-connection takes
//! effect on the very next request.

use std::borrow::Cow;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use turntable_core::context::Claims;
use turntable_core::{Client, OutboundMessage, RequestContext};
use turntable_protocol::envelope::{error_codes, parse_request};
use turntable_protocol::{ClientId, Response, RpcError};

use crate::state::{AppState, REQUEST_TIMEOUT};

/// Deadline for any single outbound frame, including pings (§4.B
/// "writeWait = 10s").
const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Maximum gap between incoming pongs before a connection is considered
/// dead (§4.B "pongWait = 60s").
const PONG_WAIT: Duration = Duration::from_secs(60);

/// Write-pump ping cadence, `(pongWait * 9) / 10` (§4.B "pingPeriod").
const PING_PERIOD: Duration = Duration::from_secs(54);

/// Inbound frame size cap; a frame over this is rejected and the
/// connection closed (§4.B "maxMessageSize = 512 KiB").
const MAX_MESSAGE_SIZE: usize = 512 * 1024;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn ws_handler(State(state): State<AppState>, Query(query): Query<WsQuery>, headers: HeaderMap, ws: WebSocketUpgrade) -> impl IntoResponse {
    let token = query.token.or_else(|| bearer_token(&headers));
    ws.on_upgrade(move |socket| handle_socket(socket, state, token))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_owned)
}

async fn handle_socket(socket: WebSocket, state: AppState, token: Option<String>) {
    let (mut sink, stream) = socket.split();
    let (client, outbound_rx) = Client::new(ClientId::generate());

    if let Some(token) = token {
        match state.auth.authenticate_token(&token).await {
            Ok(claims) => {
                state.hub.register(client.clone()).await;
                if let Some(user_id) = claims.user_id {
                    state.hub.bind_user(client.id(), user_id.clone()).await;
                    if let Err(error) = state.presence.touch(&user_id, None).await {
                        warn!(%error, "failed to record presence on connect");
                    }
                }
            }
            Err(error) => {
                warn!(%error, "rejecting websocket handshake: invalid token");
                reject_handshake(&mut sink).await;
                return;
            }
        }
    } else {
        state.hub.register(client.clone()).await;
    }

    info!(client_id = %client.id(), "client connected");

    let write_task = tokio::spawn(write_pump(sink, outbound_rx));
    read_pump(&state, &client, stream).await;

    teardown(&state, &client).await;
    // The write pump's `outbound_rx.recv()` only resolves to `None` once
    // every `Client` clone (hub's included, already dropped by teardown)
    // is gone — drop this last one explicitly instead of deadlocking on
    // `write_task` while still holding a sender.
    drop(client);
    let _ = write_task.await;
}

async fn read_pump(state: &AppState, client: &Client, mut stream: SplitStream<WebSocket>) {
    loop {
        let remaining = PONG_WAIT.saturating_sub(client.last_pong_elapsed().await);
        let next = tokio::time::timeout(remaining, stream.next()).await;
        match next {
            Ok(Some(Ok(Message::Text(text)))) => {
                if text.len() > MAX_MESSAGE_SIZE {
                    warn!(client_id = %client.id(), size = text.len(), "rejecting oversized frame");
                    break;
                }
                client.touch_pong().await;
                handle_frame(state, client, &text).await;
            }
            Ok(Some(Ok(Message::Pong(_)))) => {
                client.touch_pong().await;
            }
            Ok(Some(Ok(Message::Close(_)))) => break,
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(error))) => {
                warn!(%error, "websocket read error");
                break;
            }
            Ok(None) => break,
            Err(_elapsed) => {
                warn!(client_id = %client.id(), "pong deadline exceeded, disconnecting");
                break;
            }
        }
    }
}

async fn write_pump(mut sink: SplitSink<WebSocket, Message>, mut outbound_rx: mpsc::Receiver<OutboundMessage>) {
    let mut ping_interval = tokio::time::interval(PING_PERIOD);
    ping_interval.tick().await; // first tick fires immediately; consume it
    loop {
        tokio::select! {
            message = outbound_rx.recv() => {
                match message {
                    Some(OutboundMessage::Text(text)) => {
                        if !send_with_deadline(&mut sink, Message::Text(text)).await {
                            break;
                        }
                    }
                    Some(OutboundMessage::Close) => {
                        send_with_deadline(&mut sink, Message::Close(None)).await;
                        break;
                    }
                    None => break,
                }
            }
            _ = ping_interval.tick() => {
                if !send_with_deadline(&mut sink, Message::Ping(Vec::new())).await {
                    break;
                }
            }
        }
    }
}

async fn send_with_deadline(sink: &mut SplitSink<WebSocket, Message>, message: Message) -> bool {
    matches!(tokio::time::timeout(WRITE_WAIT, sink.send(message)).await, Ok(Ok(())))
}

async fn close_with_code(sink: &mut SplitSink<WebSocket, Message>, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: Cow::Owned(reason.to_owned()),
    };
    let _ = send_with_deadline(sink, Message::Close(Some(frame))).await;
}

/// §4.D step 2: a failed handshake writes a final JSON-RPC error frame
/// before closing with policy code 1008, so the client sees *why* rather
/// than a bare close.
async fn reject_handshake(sink: &mut SplitSink<WebSocket, Message>) {
    let error = Response::failure(None, RpcError::new(error_codes::INVALID_TOKEN, "invalid or expired token"));
    if let Ok(text) = serde_json::to_string(&error) {
        let _ = send_with_deadline(sink, Message::Text(text)).await;
    }
    close_with_code(sink, 1008, "invalid or expired token").await;
}

async fn handle_frame(state: &AppState, client: &Client, raw: &str) {
    let request = match parse_request(raw) {
        Ok(request) => request,
        Err(error) => {
            let response = Response::failure(None, RpcError::new(error.code(), error.to_string()));
            send_response(client, &response).await;
            return;
        }
    };

    let claims = Claims {
        user_id: client.user_id().await,
        username: None,
        roles: Vec::new(),
    };
    let ctx = RequestContext::new(client.id(), claims, REQUEST_TIMEOUT, state.shutdown.clone());
    if let Some(response) = state.router.handle_request(request, ctx, client.clone()).await {
        send_response(client, &response).await;
    }
}

async fn send_response(client: &Client, response: &Response) {
    match serde_json::to_string(response) {
        Ok(text) => {
            let _ = client.send_text(text).await;
        }
        Err(error) => error!(%error, "failed to serialize rpc response"),
    }
}

/// Unregisters the client from the hub and, if it was joined to a room,
/// runs it through the same [`turntable_core::RoomManager::leave`] path a
/// graceful `room.leave` call would — a dropped socket and an explicit
/// leave should look identical to everyone else still in the room.
/// Idempotent: the read pump is the only caller, so this runs at most
/// once per connection regardless of which side closed first.
async fn teardown(state: &AppState, client: &Client) {
    let room_id = client.room_id().await;
    let user_id = client.user_id().await;
    state.hub.unregister(client.id()).await;
    if let (Some(room_id), Some(user_id)) = (room_id, user_id.clone()) {
        if let Err(error) = state.rooms.leave(&room_id, &user_id).await {
            warn!(%error, "failed to clean up room membership on disconnect");
        }
    }
    if let Some(user_id) = &user_id {
        if state.hub.clients_for_user(user_id).await.is_empty() {
            let _ = state.presence.remove(user_id).await;
        }
    }
    info!(client_id = %client.id(), "client disconnected");
}
