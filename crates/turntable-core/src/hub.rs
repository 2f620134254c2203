//! The Hub: process-wide indices from id to `Client`, and the fanout
//! primitives built on top of them (§4.C).
//!
//! Grounded on `services/server/src/state.rs`'s `AppState` registries
//! (`broadcast_registry`, `active_receiver_sessions`): each is an
//! `Arc<RwLock<HashMap<_, _>>>` with register/unregister/get methods. The
//! Hub generalizes that shape to three parallel indices — by client, by
//! room membership, by user — so a broadcast can target a room, a single
//! user's every connection, or the whole process.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use turntable_protocol::{ClientId, RoomId, UserId};

use crate::client::{Client, OutboundMessage};

#[derive(Default)]
struct HubIndices {
    clients: HashMap<ClientId, Client>,
    rooms: HashMap<RoomId, HashSet<ClientId>>,
    user_clients: HashMap<UserId, HashSet<ClientId>>,
}

/// Shared, cloneable handle to the process-wide client registry.
#[derive(Clone, Default)]
pub struct Hub {
    indices: Arc<RwLock<HubIndices>>,
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, client: Client) {
        let mut indices = self.indices.write().await;
        indices.clients.insert(client.id(), client);
    }

    /// Removes a client from every index: the client table, its room's
    /// membership set, and its user's connection set. Idempotent.
    pub async fn unregister(&self, client_id: ClientId) {
        let mut indices = self.indices.write().await;
        let Some(client) = indices.clients.remove(&client_id) else {
            return;
        };
        if let Some(room_id) = client.room_id().await {
            if let Some(members) = indices.rooms.get_mut(&room_id) {
                members.remove(&client_id);
                if members.is_empty() {
                    indices.rooms.remove(&room_id);
                }
            }
        }
        if let Some(user_id) = client.user_id().await {
            if let Some(conns) = indices.user_clients.get_mut(&user_id) {
                conns.remove(&client_id);
                if conns.is_empty() {
                    indices.user_clients.remove(&user_id);
                }
            }
        }
    }

    pub async fn client(&self, client_id: ClientId) -> Option<Client> {
        self.indices.read().await.clients.get(&client_id).cloned()
    }

    pub async fn bind_user(&self, client_id: ClientId, user_id: UserId) {
        let client = self.client(client_id).await;
        let Some(client) = client else { return };
        client.set_user_id(Some(user_id.clone())).await;
        self.indices
            .write()
            .await
            .user_clients
            .entry(user_id)
            .or_default()
            .insert(client_id);
    }

    /// Moves a client into a room's membership set, removing it from any
    /// room it previously occupied. A client belongs to at most one room
    /// at a time (§4.G).
    pub async fn join_room(&self, client_id: ClientId, room_id: RoomId) {
        let Some(client) = self.client(client_id).await else {
            return;
        };
        let previous = client.room_id().await;
        client.set_room_id(Some(room_id)).await;

        let mut indices = self.indices.write().await;
        if let Some(previous) = previous {
            if let Some(members) = indices.rooms.get_mut(&previous) {
                members.remove(&client_id);
                if members.is_empty() {
                    indices.rooms.remove(&previous);
                }
            }
        }
        indices.rooms.entry(room_id).or_default().insert(client_id);
    }

    pub async fn leave_room(&self, client_id: ClientId) -> Option<RoomId> {
        let Some(client) = self.client(client_id).await else {
            return None;
        };
        let room_id = client.room_id().await?;
        client.set_room_id(None).await;

        let mut indices = self.indices.write().await;
        if let Some(members) = indices.rooms.get_mut(&room_id) {
            members.remove(&client_id);
            if members.is_empty() {
                indices.rooms.remove(&room_id);
            }
        }
        Some(room_id)
    }

    pub async fn room_members(&self, room_id: RoomId) -> Vec<ClientId> {
        self.indices
            .read()
            .await
            .rooms
            .get(&room_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn room_size(&self, room_id: RoomId) -> usize {
        self.indices
            .read()
            .await
            .rooms
            .get(&room_id)
            .map_or(0, HashSet::len)
    }

    /// Enqueues `text` on every client in `room_id`. A client whose mailbox
    /// is full is a slow consumer (§4.C): it is unregistered here rather
    /// than allowed to stall the broadcast for everyone else.
    pub async fn broadcast_to_room(&self, room_id: RoomId, text: &str) {
        let members = self.room_members(room_id).await;
        self.fan_out(members, text).await;
    }

    /// Enqueues `text` on every connection a user currently has open
    /// (§4.C "broadcast to all of a user's connections").
    pub async fn broadcast_to_user(&self, user_id: &UserId, text: &str) {
        let members = self
            .indices
            .read()
            .await
            .user_clients
            .get(user_id)
            .map(|set| set.iter().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        self.fan_out(members, text).await;
    }

    async fn fan_out(&self, client_ids: Vec<ClientId>, text: &str) {
        let mut slow = Vec::new();
        for client_id in client_ids {
            let Some(client) = self.client(client_id).await else {
                continue;
            };
            if !client.try_send(OutboundMessage::Text(text.to_owned())) {
                warn!(client_id = %client_id, "slow consumer, scheduling for disconnect");
                slow.push(client_id);
            }
        }
        for client_id in slow {
            self.unregister(client_id).await;
        }
    }

    pub async fn client_count(&self) -> usize {
        self.indices.read().await.clients.len()
    }

    pub async fn clients_for_user(&self, user_id: &UserId) -> Vec<ClientId> {
        self.indices
            .read()
            .await
            .user_clients
            .get(user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turntable_protocol::{ClientId, RoomId, UserId};

    async fn registered(hub: &Hub) -> (ClientId, tokio::sync::mpsc::Receiver<OutboundMessage>) {
        let (client, rx) = Client::new(ClientId::generate());
        let id = client.id();
        hub.register(client).await;
        (id, rx)
    }

    #[tokio::test]
    async fn join_room_moves_membership_between_rooms() {
        let hub = Hub::new();
        let (id, _rx) = registered(&hub).await;
        let room_a = RoomId::generate(1);
        let room_b = RoomId::generate(2);

        hub.join_room(id, room_a).await;
        assert_eq!(hub.room_members(room_a).await, vec![id]);

        hub.join_room(id, room_b).await;
        assert!(hub.room_members(room_a).await.is_empty());
        assert_eq!(hub.room_members(room_b).await, vec![id]);
    }

    #[tokio::test]
    async fn unregister_clears_room_and_user_indices() {
        let hub = Hub::new();
        let (id, _rx) = registered(&hub).await;
        let room = RoomId::generate(1);
        let user = UserId::from("u-1");

        hub.join_room(id, room).await;
        hub.bind_user(id, user.clone()).await;
        hub.unregister(id).await;

        assert_eq!(hub.room_size(room).await, 0);
        assert!(hub.client(id).await.is_none());
    }

    #[tokio::test]
    async fn broadcast_to_room_reaches_every_member() {
        let hub = Hub::new();
        let room = RoomId::generate(1);
        let (id_a, mut rx_a) = registered(&hub).await;
        let (id_b, mut rx_b) = registered(&hub).await;
        hub.join_room(id_a, room).await;
        hub.join_room(id_b, room).await;

        hub.broadcast_to_room(room, "hello").await;

        assert!(matches!(rx_a.try_recv().unwrap(), OutboundMessage::Text(t) if t == "hello"));
        assert!(matches!(rx_b.try_recv().unwrap(), OutboundMessage::Text(t) if t == "hello"));
    }

    #[tokio::test]
    async fn a_full_mailbox_gets_the_client_disconnected_not_the_broadcast_stalled() {
        let hub = Hub::new();
        let room = RoomId::generate(1);
        let (id, rx) = registered(&hub).await;
        hub.join_room(id, room).await;
        drop(rx);

        hub.broadcast_to_room(room, "hello").await;

        assert!(hub.client(id).await.is_none());
        assert_eq!(hub.room_size(room).await, 0);
    }

    #[tokio::test]
    async fn broadcast_to_user_reaches_all_of_their_connections() {
        let hub = Hub::new();
        let user = UserId::from("u-1");
        let (id_a, mut rx_a) = registered(&hub).await;
        let (id_b, mut rx_b) = registered(&hub).await;
        hub.bind_user(id_a, user.clone()).await;
        hub.bind_user(id_b, user.clone()).await;

        hub.broadcast_to_user(&user, "ping").await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }
}
