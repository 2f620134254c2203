//! The `Client` handle: a connected WebSocket's outbound mailbox and the
//! room/user identity the session layer has attached to it.
//!
//! Grounded on `services/server/src/ws_forwarder.rs`'s per-connection
//! `mpsc::Sender` command channel: that file hands a forwarder socket a
//! bounded `mpsc::Sender<EpochResetCommand>` that a separate task drains
//! into `socket.send(...)`. `Client` generalizes the same shape to every
//! connected session: the read/write pump owns the `WebSocket`, and every
//! other task (the hub, the router, another client's broadcast) only ever
//! touches the `mpsc::Sender<OutboundMessage>` half.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};

use turntable_protocol::{ClientId, RoomId, UserId};

/// Outbound mailbox capacity per client (§5 "every client has a bounded
/// send buffer (64 messages)"). A client that can't drain this fast is
/// considered a slow consumer and is disconnected rather than allowed to
/// apply backpressure to the hub.
pub const OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Text(String),
    Close,
}

/// A connected client's mutable session state: which room it currently
/// occupies, if any. `None` means connected but not joined to a room.
#[derive(Debug, Clone, Default)]
struct ClientState {
    room_id: Option<RoomId>,
}

/// Handle to a connected WebSocket session, shared between the read/write
/// pump (which owns the socket) and every task that wants to push a
/// message at this client (the hub's fanout, a direct reply).
///
/// Cloning a `Client` is cheap: it is a sender handle plus an `Arc`-shared
/// bit of mutable state, not the connection itself.
#[derive(Clone)]
pub struct Client {
    id: ClientId,
    user_id: Arc<RwLock<Option<UserId>>>,
    sender: mpsc::Sender<OutboundMessage>,
    state: Arc<RwLock<ClientState>>,
    last_pong: Arc<RwLock<Instant>>,
}

impl Client {
    /// Creates a new client handle and its paired outbound receiver. The
    /// caller (the connection's write pump) owns the receiver and drains
    /// it into the socket.
    #[must_use]
    pub fn new(id: ClientId) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::channel(OUTBOUND_BUFFER);
        let client = Self {
            id,
            user_id: Arc::new(RwLock::new(None)),
            sender,
            state: Arc::new(RwLock::new(ClientState::default())),
            last_pong: Arc::new(RwLock::new(Instant::now())),
        };
        (client, receiver)
    }

    #[must_use]
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub async fn user_id(&self) -> Option<UserId> {
        self.user_id.read().await.clone()
    }

    pub async fn set_user_id(&self, user_id: Option<UserId>) {
        *self.user_id.write().await = user_id;
    }

    pub async fn room_id(&self) -> Option<RoomId> {
        self.state.read().await.room_id
    }

    pub async fn set_room_id(&self, room_id: Option<RoomId>) {
        self.state.write().await.room_id = room_id;
    }

    /// Enqueues a message without blocking. Per §4.C, a full mailbox marks
    /// the client a slow consumer: the caller should schedule it for
    /// disconnection rather than wait for room.
    ///
    /// Returns `false` if the mailbox is full or the client has already
    /// disconnected (receiver dropped).
    pub fn try_send(&self, message: OutboundMessage) -> bool {
        self.sender.try_send(message).is_ok()
    }

    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        self.sender.send(OutboundMessage::Text(text.into())).await.is_ok()
    }

    /// Marks the connection alive. The read pump calls this on every pong
    /// and on every successfully received frame, resetting the `pongWait`
    /// deadline it enforces (§4.B).
    pub async fn touch_pong(&self) {
        *self.last_pong.write().await = Instant::now();
    }

    #[must_use]
    pub async fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.read().await.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_client_starts_unauthenticated_and_roomless() {
        let (client, _rx) = Client::new(ClientId::generate());
        assert!(client.user_id().await.is_none());
        assert!(client.room_id().await.is_none());
    }

    #[tokio::test]
    async fn try_send_fails_once_mailbox_is_full() {
        let (client, _rx) = Client::new(ClientId::generate());
        for _ in 0..OUTBOUND_BUFFER {
            assert!(client.try_send(OutboundMessage::Text("x".to_owned())));
        }
        assert!(!client.try_send(OutboundMessage::Text("overflow".to_owned())));
    }

    #[tokio::test]
    async fn try_send_fails_after_receiver_is_dropped() {
        let (client, rx) = Client::new(ClientId::generate());
        drop(rx);
        assert!(!client.try_send(OutboundMessage::Close));
    }

    #[tokio::test]
    async fn touch_pong_resets_the_elapsed_time() {
        let (client, _rx) = Client::new(ClientId::generate());
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let before = client.last_pong_elapsed().await;
        client.touch_pong().await;
        let after = client.last_pong_elapsed().await;
        assert!(after < before);
    }

    #[tokio::test]
    async fn room_id_round_trips_through_set_and_get() {
        let (client, _rx) = Client::new(ClientId::generate());
        let room = RoomId::generate(1_700_000_000);
        client.set_room_id(Some(room)).await;
        assert_eq!(client.room_id().await, Some(room));
        client.set_room_id(None).await;
        assert_eq!(client.room_id().await, None);
    }
}
