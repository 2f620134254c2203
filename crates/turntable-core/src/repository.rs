//! Persistence capability boundaries (§1 non-goal: "no specific storage
//! backend").
//!
//! `repo/events.rs` talks to Postgres directly through `sqlx` queries.
//! Rather than carry a concrete `sqlx` dependency into `turntable-core`
//! (which has no I/O otherwise), each storage concern — rooms, users,
//! playlists — gets its own trait. `services/server` is where a real
//! `sqlx` implementation of these traits would live; for now it's
//! backed by the in-memory stores in `services/server/src/memory.rs`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use turntable_protocol::methods::playlist::PlaylistItem;
use turntable_protocol::methods::room::RoomSettings;
use turntable_protocol::{PlaylistId, RoomId, UserId};

use crate::error::DomainError;

/// The persisted half of a room (§3 "Room"), distinct from the volatile
/// per-room runtime state in [`crate::room::state::RoomRuntimeState`].
#[derive(Debug, Clone)]
pub struct RoomRecord {
    pub id: RoomId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub creator_id: UserId,
    pub moderator_ids: HashSet<UserId>,
    pub banned_user_ids: HashSet<UserId>,
    pub settings: RoomSettings,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct RoomUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub settings: Option<RoomSettings>,
}

#[derive(Debug, Clone)]
pub struct RoomSearchQuery {
    pub text: Option<String>,
    pub limit: u32,
    pub skip: u32,
}

#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn create(&self, slug: &str, name: &str, description: &str, creator_id: &UserId, settings: RoomSettings) -> Result<RoomRecord, DomainError>;
    async fn get(&self, room_id: &RoomId) -> Result<RoomRecord, DomainError>;
    async fn get_by_slug(&self, slug: &str) -> Result<RoomRecord, DomainError>;
    async fn update(&self, room_id: &RoomId, patch: RoomUpdate) -> Result<RoomRecord, DomainError>;
    async fn delete(&self, room_id: &RoomId) -> Result<(), DomainError>;
    async fn search(&self, query: &RoomSearchQuery) -> Result<(Vec<RoomRecord>, u64), DomainError>;
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
    pub experience: u64,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, user_id: &UserId) -> Result<UserRecord, DomainError>;
    async fn find_by_username(&self, username: &str) -> Result<UserRecord, DomainError>;
    async fn update_profile(&self, user_id: &UserId, username: Option<String>, avatar_url: Option<String>) -> Result<UserRecord, DomainError>;
    async fn add_experience(&self, user_id: &UserId, delta: u64) -> Result<UserRecord, DomainError>;
    async fn top_by_experience(&self, limit: u32) -> Result<Vec<UserRecord>, DomainError>;
    async fn rank_of(&self, user_id: &UserId) -> Result<u64, DomainError>;
}

#[derive(Debug, Clone)]
pub struct PlaylistRecord {
    pub id: PlaylistId,
    pub owner_id: UserId,
    pub name: String,
    pub items: Vec<PlaylistItem>,
    pub active: bool,
}

#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    async fn create(&self, owner_id: &UserId, name: &str, items: Vec<PlaylistItem>) -> Result<PlaylistRecord, DomainError>;
    async fn get(&self, playlist_id: &PlaylistId) -> Result<PlaylistRecord, DomainError>;
    async fn get_for_owner(&self, owner_id: &UserId) -> Result<Vec<PlaylistRecord>, DomainError>;
    async fn rename(&self, playlist_id: &PlaylistId, name: &str) -> Result<PlaylistRecord, DomainError>;
    async fn add_item(&self, playlist_id: &PlaylistId, item: PlaylistItem) -> Result<PlaylistRecord, DomainError>;
    async fn remove_item(&self, playlist_id: &PlaylistId, media_id: &str) -> Result<PlaylistRecord, DomainError>;
    async fn replace_items(&self, playlist_id: &PlaylistId, items: Vec<PlaylistItem>) -> Result<PlaylistRecord, DomainError>;
    async fn set_active(&self, owner_id: &UserId, playlist_id: &PlaylistId) -> Result<PlaylistRecord, DomainError>;
    async fn get_active(&self, owner_id: &UserId) -> Result<Option<PlaylistRecord>, DomainError>;
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<PlaylistRecord>, DomainError>;
    async fn delete(&self, playlist_id: &PlaylistId) -> Result<(), DomainError>;
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    #[derive(Default)]
    pub struct InMemoryRoomRepository {
        rooms: RwLock<HashMap<RoomId, RoomRecord>>,
    }

    #[async_trait]
    impl RoomRepository for InMemoryRoomRepository {
        async fn create(&self, slug: &str, name: &str, description: &str, creator_id: &UserId, settings: RoomSettings) -> Result<RoomRecord, DomainError> {
            let mut rooms = self.rooms.write().await;
            if rooms.values().any(|r| r.slug == slug) {
                return Err(DomainError::RoomAlreadyExists);
            }
            let mut moderator_ids = HashSet::new();
            moderator_ids.insert(creator_id.clone());
            let record = RoomRecord {
                id: RoomId::generate(0),
                slug: slug.to_owned(),
                name: name.to_owned(),
                description: description.to_owned(),
                creator_id: creator_id.clone(),
                moderator_ids,
                banned_user_ids: HashSet::new(),
                settings,
                active: true,
                created_at: Utc::now(),
            };
            rooms.insert(record.id, record.clone());
            Ok(record)
        }

        async fn get(&self, room_id: &RoomId) -> Result<RoomRecord, DomainError> {
            self.rooms
                .read()
                .await
                .get(room_id)
                .cloned()
                .ok_or(DomainError::RoomNotFound)
        }

        async fn get_by_slug(&self, slug: &str) -> Result<RoomRecord, DomainError> {
            self.rooms
                .read()
                .await
                .values()
                .find(|r| r.slug == slug)
                .cloned()
                .ok_or(DomainError::RoomNotFound)
        }

        async fn update(&self, room_id: &RoomId, patch: RoomUpdate) -> Result<RoomRecord, DomainError> {
            let mut rooms = self.rooms.write().await;
            let record = rooms.get_mut(room_id).ok_or(DomainError::RoomNotFound)?;
            if let Some(name) = patch.name {
                record.name = name;
            }
            if let Some(description) = patch.description {
                record.description = description;
            }
            if let Some(settings) = patch.settings {
                record.settings = settings;
            }
            Ok(record.clone())
        }

        async fn delete(&self, room_id: &RoomId) -> Result<(), DomainError> {
            self.rooms
                .write()
                .await
                .remove(room_id)
                .map(|_| ())
                .ok_or(DomainError::RoomNotFound)
        }

        async fn search(&self, query: &RoomSearchQuery) -> Result<(Vec<RoomRecord>, u64), DomainError> {
            let rooms = self.rooms.read().await;
            let mut matches: Vec<RoomRecord> = rooms
                .values()
                .filter(|room| {
                    query
                        .text
                        .as_deref()
                        .is_none_or(|text| room.name.to_lowercase().contains(&text.to_lowercase()))
                })
                .cloned()
                .collect();
            matches.sort_by_key(|room| room.created_at);
            let total = matches.len() as u64;
            let page = matches
                .into_iter()
                .skip(query.skip as usize)
                .take(query.limit as usize)
                .collect();
            Ok((page, total))
        }
    }

    #[derive(Default)]
    pub struct InMemoryUserRepository {
        users: RwLock<HashMap<UserId, UserRecord>>,
    }

    impl InMemoryUserRepository {
        pub async fn seed(&self, record: UserRecord) {
            self.users.write().await.insert(record.id.clone(), record);
        }
    }

    #[async_trait]
    impl UserRepository for InMemoryUserRepository {
        async fn get(&self, user_id: &UserId) -> Result<UserRecord, DomainError> {
            self.users.read().await.get(user_id).cloned().ok_or(DomainError::UserNotFound)
        }

        async fn find_by_username(&self, username: &str) -> Result<UserRecord, DomainError> {
            self.users
                .read()
                .await
                .values()
                .find(|u| u.username == username)
                .cloned()
                .ok_or(DomainError::UserNotFound)
        }

        async fn update_profile(&self, user_id: &UserId, username: Option<String>, avatar_url: Option<String>) -> Result<UserRecord, DomainError> {
            let mut users = self.users.write().await;
            let record = users.get_mut(user_id).ok_or(DomainError::UserNotFound)?;
            if let Some(username) = username {
                record.username = username;
            }
            if avatar_url.is_some() {
                record.avatar_url = avatar_url;
            }
            Ok(record.clone())
        }

        async fn add_experience(&self, user_id: &UserId, delta: u64) -> Result<UserRecord, DomainError> {
            let mut users = self.users.write().await;
            let record = users.get_mut(user_id).ok_or(DomainError::UserNotFound)?;
            record.experience += delta;
            Ok(record.clone())
        }

        async fn top_by_experience(&self, limit: u32) -> Result<Vec<UserRecord>, DomainError> {
            let mut users: Vec<UserRecord> = self.users.read().await.values().cloned().collect();
            users.sort_by(|a, b| b.experience.cmp(&a.experience));
            users.truncate(limit as usize);
            Ok(users)
        }

        async fn rank_of(&self, user_id: &UserId) -> Result<u64, DomainError> {
            let users = self.users.read().await;
            let target = users.get(user_id).ok_or(DomainError::UserNotFound)?;
            let rank = users.values().filter(|u| u.experience > target.experience).count() as u64 + 1;
            Ok(rank)
        }
    }
}
