//! Presence registry capability boundary (§4.I).
//!
//! Modeled as out-of-process (a TTL'd key-value store) so that
//! cross-instance cleanup works without a shared in-memory lock. We model
//! it the same way `crate::auth` and `crate::media` model their external
//! dependencies: a narrow trait plus an in-memory fake good enough for
//! tests and a single-instance deployment.

use async_trait::async_trait;
use std::time::{Duration, Instant};

use turntable_protocol::{RoomId, UserId};

use crate::error::DomainError;

/// Heartbeat cadence a session server should write presence on (§6).
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// TTL after which an un-refreshed presence entry is considered stale
/// (§4.J step 3, "expire presence entries older than pongWait * 2").
pub const PRESENCE_TTL: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub current_room: Option<RoomId>,
    touched_at: Instant,
}

impl SessionRecord {
    #[must_use]
    pub fn new(user_id: UserId, current_room: Option<RoomId>) -> Self {
        Self {
            user_id,
            current_room,
            touched_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.touched_at.elapsed()
    }
}

#[async_trait]
pub trait PresenceRegistry: Send + Sync {
    /// Writes/refreshes a user's presence record. Called on connect and on
    /// every heartbeat tick.
    async fn touch(&self, user_id: &UserId, current_room: Option<RoomId>) -> Result<(), DomainError>;

    async fn get(&self, user_id: &UserId) -> Result<Option<SessionRecord>, DomainError>;

    async fn remove(&self, user_id: &UserId) -> Result<(), DomainError>;

    async fn online_users(&self) -> Result<Vec<UserId>, DomainError>;

    /// Room-scoped audience set used by maintenance (§4.J step 2) to check
    /// whether a user's claimed `current_room` is backed by a live client
    /// on *some* instance.
    async fn room_audience(&self, room_id: &RoomId) -> Result<Vec<UserId>, DomainError>;

    async fn add_to_room_audience(&self, room_id: &RoomId, user_id: &UserId) -> Result<(), DomainError>;

    async fn remove_from_room_audience(&self, room_id: &RoomId, user_id: &UserId) -> Result<(), DomainError>;

    /// §4.J step 3: drops every presence entry whose age exceeds `ttl` and
    /// returns the records that were evicted, so the caller can also clear
    /// any room audience/queue membership they still claimed.
    async fn expire_older_than(&self, ttl: Duration) -> Result<Vec<SessionRecord>, DomainError>;
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use tokio::sync::RwLock;

    /// In-memory stand-in for the out-of-process store. Does not expire
    /// entries by wall-clock TTL — tests that need expiry drive it
    /// explicitly via [`InMemoryPresenceRegistry::expire`].
    #[derive(Default)]
    pub struct InMemoryPresenceRegistry {
        sessions: RwLock<HashMap<UserId, SessionRecord>>,
        room_audiences: RwLock<HashMap<RoomId, HashSet<UserId>>>,
    }

    impl InMemoryPresenceRegistry {
        pub async fn expire(&self, user_id: &UserId) {
            self.sessions.write().await.remove(user_id);
        }
    }

    #[async_trait]
    impl PresenceRegistry for InMemoryPresenceRegistry {
        async fn touch(&self, user_id: &UserId, current_room: Option<RoomId>) -> Result<(), DomainError> {
            self.sessions
                .write()
                .await
                .insert(user_id.clone(), SessionRecord::new(user_id.clone(), current_room));
            Ok(())
        }

        async fn get(&self, user_id: &UserId) -> Result<Option<SessionRecord>, DomainError> {
            Ok(self.sessions.read().await.get(user_id).cloned())
        }

        async fn remove(&self, user_id: &UserId) -> Result<(), DomainError> {
            self.sessions.write().await.remove(user_id);
            Ok(())
        }

        async fn online_users(&self) -> Result<Vec<UserId>, DomainError> {
            Ok(self.sessions.read().await.keys().cloned().collect())
        }

        async fn room_audience(&self, room_id: &RoomId) -> Result<Vec<UserId>, DomainError> {
            Ok(self
                .room_audiences
                .read()
                .await
                .get(room_id)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default())
        }

        async fn add_to_room_audience(&self, room_id: &RoomId, user_id: &UserId) -> Result<(), DomainError> {
            self.room_audiences
                .write()
                .await
                .entry(*room_id)
                .or_default()
                .insert(user_id.clone());
            Ok(())
        }

        async fn remove_from_room_audience(&self, room_id: &RoomId, user_id: &UserId) -> Result<(), DomainError> {
            if let Some(set) = self.room_audiences.write().await.get_mut(room_id) {
                set.remove(user_id);
            }
            Ok(())
        }

        async fn expire_older_than(&self, ttl: Duration) -> Result<Vec<SessionRecord>, DomainError> {
            let mut sessions = self.sessions.write().await;
            let stale: Vec<UserId> = sessions
                .iter()
                .filter(|(_, record)| record.age() > ttl)
                .map(|(user_id, _)| user_id.clone())
                .collect();
            Ok(stale.into_iter().filter_map(|user_id| sessions.remove(&user_id)).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::InMemoryPresenceRegistry;
    use super::*;

    #[tokio::test]
    async fn touch_then_get_round_trips_current_room() {
        let registry = InMemoryPresenceRegistry::default();
        let user = UserId::from("u-1");
        let room = RoomId::generate(1);
        registry.touch(&user, Some(room)).await.unwrap();

        let record = registry.get(&user).await.unwrap().unwrap();
        assert_eq!(record.current_room, Some(room));
    }

    #[tokio::test]
    async fn room_audience_tracks_membership_independent_of_session_record() {
        let registry = InMemoryPresenceRegistry::default();
        let room = RoomId::generate(1);
        let user = UserId::from("u-1");

        registry.add_to_room_audience(&room, &user).await.unwrap();
        assert_eq!(registry.room_audience(&room).await.unwrap(), vec![user.clone()]);

        registry.remove_from_room_audience(&room, &user).await.unwrap();
        assert!(registry.room_audience(&room).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_session_is_absent_from_get_and_online_users() {
        let registry = InMemoryPresenceRegistry::default();
        let user = UserId::from("u-1");
        registry.touch(&user, None).await.unwrap();
        registry.expire(&user).await;

        assert!(registry.get(&user).await.unwrap().is_none());
        assert!(registry.online_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expire_older_than_zero_evicts_every_session_and_returns_them() {
        let registry = InMemoryPresenceRegistry::default();
        let room = RoomId::generate(1);
        let user = UserId::from("u-1");
        registry.touch(&user, Some(room)).await.unwrap();

        let expired = registry.expire_older_than(Duration::ZERO).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].user_id, user);
        assert_eq!(expired[0].current_room, Some(room));
        assert!(registry.get(&user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expire_older_than_a_long_ttl_leaves_fresh_sessions_alone() {
        let registry = InMemoryPresenceRegistry::default();
        let user = UserId::from("u-1");
        registry.touch(&user, None).await.unwrap();

        let expired = registry.expire_older_than(PRESENCE_TTL).await.unwrap();
        assert!(expired.is_empty());
        assert!(registry.get(&user).await.unwrap().is_some());
    }
}
