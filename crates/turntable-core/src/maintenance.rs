//! Periodic reconciliation between the Hub/room state and the presence
//! registry (§4.J).
//!
//! Grounded on the `heartbeat_interval` ticking loop in `ws_forwarder.rs`
//! (`tokio::time::interval` driving a `tokio::select!` branch) — here the
//! same `interval` tick drives a standalone background task instead of
//! one connection's write pump.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use turntable_protocol::{RoomId, UserId};

use crate::hub::Hub;
use crate::presence::{PresenceRegistry, PRESENCE_TTL};
use crate::room::RoomManager;

/// Reconciliation cadence (§4.J "every 5 min").
pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct Maintenance {
    presence: Arc<dyn PresenceRegistry>,
    rooms: Arc<RoomManager>,
    hub: Hub,
}

impl Maintenance {
    #[must_use]
    pub fn new(presence: Arc<dyn PresenceRegistry>, rooms: Arc<RoomManager>, hub: Hub) -> Self {
        Self { presence, rooms, hub }
    }

    /// Runs the reconciliation loop until `shutdown` fires. Intended to
    /// be spawned once at Session-server startup; §4.J also calls for an
    /// on-demand run at startup, which callers get by invoking
    /// [`Maintenance::reconcile_once`] before spawning the loop.
    pub async fn run(self: Arc<Self>, shutdown: crate::context::CancellationToken) {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.reconcile_once().await;
                }
                () = shutdown.cancelled() => {
                    info!("maintenance task shutting down");
                    return;
                }
            }
        }
    }

    /// §4.J: steps 1–2 evict ghost presence entries whose claimed room has
    /// no live Hub client backing it; step 3 then expires any presence
    /// entry that hasn't been touched within `PRESENCE_TTL`, clearing its
    /// room membership the same way a graceful leave would.
    pub async fn reconcile_once(&self) {
        let Ok(online) = self.presence.online_users().await else {
            warn!("maintenance: failed to enumerate online users");
            return;
        };
        for user_id in online {
            if let Err(error) = self.reconcile_user(&user_id).await {
                warn!(user_id = %user_id, %error, "maintenance: failed to reconcile user");
            }
        }
        self.expire_stale_sessions(PRESENCE_TTL).await;
    }

    /// §4.J step 3. Takes `ttl` as a parameter so tests can expire
    /// everything immediately instead of waiting out the real 120s TTL.
    async fn expire_stale_sessions(&self, ttl: Duration) {
        let expired = match self.presence.expire_older_than(ttl).await {
            Ok(expired) => expired,
            Err(error) => {
                warn!(%error, "maintenance: failed to expire stale presence entries");
                return;
            }
        };
        for record in expired {
            warn!(user_id = %record.user_id, "expiring stale presence entry");
            if let Some(room_id) = record.current_room {
                if let Err(error) = self.rooms.leave(&room_id, &record.user_id).await {
                    warn!(user_id = %record.user_id, room_id = %room_id, %error, "maintenance: failed to clean up room membership for an expired session");
                }
            }
        }
    }

    async fn reconcile_user(&self, user_id: &UserId) -> Result<(), crate::error::DomainError> {
        let Some(record) = self.presence.get(user_id).await? else {
            return Ok(());
        };
        let Some(room_id) = record.current_room else {
            return Ok(());
        };
        if self.has_live_client(room_id, user_id).await {
            return Ok(());
        }
        self.evict_ghost(room_id, user_id).await
    }

    async fn has_live_client(&self, room_id: RoomId, user_id: &UserId) -> bool {
        for client_id in self.hub.clients_for_user(user_id).await {
            if let Some(client) = self.hub.client(client_id).await {
                if client.room_id().await == Some(room_id) {
                    return true;
                }
            }
        }
        false
    }

    /// Evicts a user whose presence claims a room but who has no live
    /// client anywhere: drops them from the room audience and DJ queue
    /// (advancing if they were the DJ), emits `user:room_leave`, clears
    /// `current_room`.
    async fn evict_ghost(&self, room_id: RoomId, user_id: &UserId) -> Result<(), crate::error::DomainError> {
        warn!(user_id = %user_id, room_id = %room_id, "evicting ghost presence entry");
        self.rooms.leave(&room_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::fakes::InMemoryPresenceRegistry;
    use crate::repository::fakes::InMemoryRoomRepository;
    use turntable_protocol::methods::room::RoomSettings;

    #[tokio::test]
    async fn reconcile_evicts_a_user_whose_claimed_room_has_no_live_client() {
        let hub = Hub::new();
        let presence: Arc<dyn PresenceRegistry> = Arc::new(InMemoryPresenceRegistry::default());
        let rooms = Arc::new(RoomManager::new(
            Arc::new(InMemoryRoomRepository::default()),
            hub.clone(),
            presence.clone(),
        ));
        let owner = UserId::from("owner");
        let room = rooms
            .create(
                "r1",
                "Room",
                "",
                &owner,
                RoomSettings {
                    capacity: 10,
                    theme: None,
                    chat_rules: None,
                },
            )
            .await
            .unwrap();
        let ghost = UserId::from("ghost");
        rooms.join(&room.id, &ghost).await.unwrap();
        // No Hub client was ever registered for `ghost` (no live connection),
        // but the room's in-process audience still has them — simulating a
        // crashed instance that never cleaned up.
        presence.touch(&ghost, Some(room.id)).await.unwrap();

        let maintenance = Maintenance::new(presence.clone(), rooms.clone(), hub.clone());
        maintenance.reconcile_once().await;

        assert!(!rooms.is_user_in_room(&room.id, &ghost).await);
    }

    #[tokio::test]
    async fn expire_stale_sessions_clears_room_membership_for_an_expired_user() {
        let hub = Hub::new();
        let presence: Arc<dyn PresenceRegistry> = Arc::new(InMemoryPresenceRegistry::default());
        let rooms = Arc::new(RoomManager::new(
            Arc::new(InMemoryRoomRepository::default()),
            hub.clone(),
            presence.clone(),
        ));
        let owner = UserId::from("owner");
        let room = rooms
            .create(
                "r1",
                "Room",
                "",
                &owner,
                RoomSettings {
                    capacity: 10,
                    theme: None,
                    chat_rules: None,
                },
            )
            .await
            .unwrap();
        let member = UserId::from("member");
        rooms.join(&room.id, &member).await.unwrap();
        presence.touch(&member, Some(room.id)).await.unwrap();

        let maintenance = Maintenance::new(presence.clone(), rooms.clone(), hub.clone());
        maintenance.expire_stale_sessions(Duration::ZERO).await;

        assert!(!rooms.is_user_in_room(&room.id, &member).await);
        assert!(presence.get(&member).await.unwrap().is_none());
    }
}
