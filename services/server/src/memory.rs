//! Default in-process implementations of every `turntable-core` capability
//! trait (auth, rooms, users, playlists, media, presence).
//!
//! `repo/events.rs` talks to Postgres directly through `sqlx` queries
//! living next to its `AppState` (`state.rs`'s `Arc<RwLock<HashMap<_,
//! _>>>` registries). Nothing here names a specific identity provider,
//! media catalog, or database — those are explicitly out of scope — so
//! this module gives the binary a working default the same shape as
//! those registries (`Arc<RwLock<HashMap<_, _>>>` guarding plain
//! structs) instead of a real external backend. A deployment that needs
//! durability swaps these out behind the same traits without touching
//! `turntable-core` or the RPC handlers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use turntable_core::auth::{AuthProvider, Credentials};
use turntable_core::context::Claims;
use turntable_core::error::DomainError;
use turntable_core::media::MediaResolver;
use turntable_core::presence::{PresenceRegistry, SessionRecord};
use turntable_core::repository::{PlaylistRecord, PlaylistRepository, RoomRecord, RoomRepository, RoomSearchQuery, RoomUpdate, UserRecord, UserRepository};
use turntable_protocol::methods::playlist::PlaylistItem;
use turntable_protocol::methods::room::RoomSettings;
use turntable_protocol::{MediaId, MediaInfo, PlaylistId, RoomId, UserId};

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn issue_token() -> String {
    hex::encode(uuid::Uuid::new_v4().as_bytes())
}

struct Account {
    user_id: UserId,
    username: String,
    password_hash: String,
}

/// Bearer-token auth backed by a process-local account table. Registration
/// lives here (§6 `user.register`) rather than on the `AuthProvider` trait
/// itself, since account creation is this implementation's concern, not a
/// capability the router needs to abstract over.
#[derive(Default)]
pub struct InMemoryAuth {
    accounts_by_username: RwLock<HashMap<String, Account>>,
    tokens: RwLock<HashMap<String, UserId>>,
}

impl InMemoryAuth {
    pub async fn register(&self, username: &str, password: &str) -> Result<(UserId, String), DomainError> {
        let mut accounts = self.accounts_by_username.write().await;
        if accounts.contains_key(username) {
            return Err(DomainError::UserAlreadyExists);
        }
        let user_id = UserId::from(uuid::Uuid::new_v4().to_string());
        accounts.insert(
            username.to_owned(),
            Account {
                user_id: user_id.clone(),
                username: username.to_owned(),
                password_hash: hash_password(password),
            },
        );
        let token = issue_token();
        self.tokens.write().await.insert(token.clone(), user_id.clone());
        Ok((user_id, token))
    }

    pub async fn change_password(&self, user_id: &UserId, current: &str, new: &str) -> Result<(), DomainError> {
        let mut accounts = self.accounts_by_username.write().await;
        let account = accounts
            .values_mut()
            .find(|a| a.user_id == *user_id)
            .ok_or(DomainError::UserNotFound)?;
        if account.password_hash != hash_password(current) {
            return Err(DomainError::NotAuthorized);
        }
        account.password_hash = hash_password(new);
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuth {
    async fn authenticate_token(&self, token: &str) -> Result<Claims, DomainError> {
        let user_id = self.tokens.read().await.get(token).cloned().ok_or(DomainError::InvalidToken)?;
        Ok(Claims {
            user_id: Some(user_id),
            username: None,
            roles: Vec::new(),
        })
    }

    async fn login(&self, credentials: Credentials) -> Result<(Claims, String), DomainError> {
        let accounts = self.accounts_by_username.read().await;
        let account = accounts.get(&credentials.username).ok_or(DomainError::UserNotFound)?;
        if account.password_hash != hash_password(&credentials.password) {
            return Err(DomainError::NotAuthorized);
        }
        let token = issue_token();
        self.tokens.write().await.insert(token.clone(), account.user_id.clone());
        let claims = Claims {
            user_id: Some(account.user_id.clone()),
            username: Some(account.username.clone()),
            roles: Vec::new(),
        };
        Ok((claims, token))
    }

    async fn logout(&self, user_id: &UserId) -> Result<(), DomainError> {
        self.tokens.write().await.retain(|_, v| v != user_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRooms {
    rooms: RwLock<HashMap<RoomId, RoomRecord>>,
}

#[async_trait]
impl RoomRepository for InMemoryRooms {
    async fn create(&self, slug: &str, name: &str, description: &str, creator_id: &UserId, settings: RoomSettings) -> Result<RoomRecord, DomainError> {
        let mut rooms = self.rooms.write().await;
        if rooms.values().any(|r| r.slug == slug) {
            return Err(DomainError::RoomAlreadyExists);
        }
        let mut moderator_ids = std::collections::HashSet::new();
        moderator_ids.insert(creator_id.clone());
        let record = RoomRecord {
            id: RoomId::generate(chrono::Utc::now().timestamp() as u32),
            slug: slug.to_owned(),
            name: name.to_owned(),
            description: description.to_owned(),
            creator_id: creator_id.clone(),
            moderator_ids,
            banned_user_ids: std::collections::HashSet::new(),
            settings,
            active: true,
            created_at: chrono::Utc::now(),
        };
        rooms.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, room_id: &RoomId) -> Result<RoomRecord, DomainError> {
        self.rooms.read().await.get(room_id).cloned().ok_or(DomainError::RoomNotFound)
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
        self.rooms.write().await.remove(room_id).map(|_| ()).ok_or(DomainError::RoomNotFound)
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
        let page = matches.into_iter().skip(query.skip as usize).take(query.limit as usize).collect();
        Ok((page, total))
    }
}

#[derive(Default)]
pub struct InMemoryUsers {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl InMemoryUsers {
    /// Ensures a `UserRecord` exists for a freshly authenticated account;
    /// the stats/experience table is keyed independently of login.
    pub async fn ensure(&self, user_id: &UserId, username: &str) -> UserRecord {
        let mut users = self.users.write().await;
        users
            .entry(user_id.clone())
            .or_insert_with(|| UserRecord {
                id: user_id.clone(),
                username: username.to_owned(),
                avatar_url: None,
                experience: 0,
            })
            .clone()
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
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

#[derive(Default)]
pub struct InMemoryPlaylists {
    playlists: RwLock<HashMap<PlaylistId, PlaylistRecord>>,
}

#[async_trait]
impl PlaylistRepository for InMemoryPlaylists {
    async fn create(&self, owner_id: &UserId, name: &str, items: Vec<PlaylistItem>) -> Result<PlaylistRecord, DomainError> {
        let record = PlaylistRecord {
            id: PlaylistId::from(uuid::Uuid::new_v4().to_string()),
            owner_id: owner_id.clone(),
            name: name.to_owned(),
            items,
            active: false,
        };
        self.playlists.write().await.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, playlist_id: &PlaylistId) -> Result<PlaylistRecord, DomainError> {
        self.playlists.read().await.get(playlist_id).cloned().ok_or(DomainError::PlaylistNotFound)
    }

    async fn get_for_owner(&self, owner_id: &UserId) -> Result<Vec<PlaylistRecord>, DomainError> {
        Ok(self.playlists.read().await.values().filter(|p| p.owner_id == *owner_id).cloned().collect())
    }

    async fn rename(&self, playlist_id: &PlaylistId, name: &str) -> Result<PlaylistRecord, DomainError> {
        let mut playlists = self.playlists.write().await;
        let record = playlists.get_mut(playlist_id).ok_or(DomainError::PlaylistNotFound)?;
        record.name = name.to_owned();
        Ok(record.clone())
    }

    async fn add_item(&self, playlist_id: &PlaylistId, item: PlaylistItem) -> Result<PlaylistRecord, DomainError> {
        let mut playlists = self.playlists.write().await;
        let record = playlists.get_mut(playlist_id).ok_or(DomainError::PlaylistNotFound)?;
        record.items.push(item);
        Ok(record.clone())
    }

    async fn remove_item(&self, playlist_id: &PlaylistId, media_id: &str) -> Result<PlaylistRecord, DomainError> {
        let mut playlists = self.playlists.write().await;
        let record = playlists.get_mut(playlist_id).ok_or(DomainError::PlaylistNotFound)?;
        record.items.retain(|item| item.media_id.as_str() != media_id);
        Ok(record.clone())
    }

    async fn replace_items(&self, playlist_id: &PlaylistId, items: Vec<PlaylistItem>) -> Result<PlaylistRecord, DomainError> {
        let mut playlists = self.playlists.write().await;
        let record = playlists.get_mut(playlist_id).ok_or(DomainError::PlaylistNotFound)?;
        record.items = items;
        Ok(record.clone())
    }

    async fn set_active(&self, owner_id: &UserId, playlist_id: &PlaylistId) -> Result<PlaylistRecord, DomainError> {
        let mut playlists = self.playlists.write().await;
        if !playlists.get(playlist_id).is_some_and(|p| p.owner_id == *owner_id) {
            return Err(DomainError::PlaylistNotFound);
        }
        for record in playlists.values_mut().filter(|p| p.owner_id == *owner_id) {
            record.active = record.id == *playlist_id;
        }
        Ok(playlists.get(playlist_id).expect("checked above").clone())
    }

    async fn get_active(&self, owner_id: &UserId) -> Result<Option<PlaylistRecord>, DomainError> {
        Ok(self.playlists.read().await.values().find(|p| p.owner_id == *owner_id && p.active).cloned())
    }

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<PlaylistRecord>, DomainError> {
        let needle = query.to_lowercase();
        Ok(self
            .playlists
            .read()
            .await
            .values()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn delete(&self, playlist_id: &PlaylistId) -> Result<(), DomainError> {
        self.playlists.write().await.remove(playlist_id).map(|_| ()).ok_or(DomainError::PlaylistNotFound)
    }
}

/// A small fixed catalog standing in for a real media backend (§1
/// non-goal "no specific media backend"). Good enough to exercise
/// `media.search`/`queue.playMedia` end to end without a network call.
pub struct InMemoryMedia {
    catalog: RwLock<HashMap<MediaId, MediaInfo>>,
}

impl Default for InMemoryMedia {
    fn default() -> Self {
        let seed = [
            ("m-1", "Nightdrive", "Reaktor 9", 214),
            ("m-2", "Slow Bloom", "Marigold Static", 187),
            ("m-3", "Concrete Garden", "Reaktor 9", 251),
        ];
        let mut catalog = HashMap::new();
        for (id, title, artist, duration_secs) in seed {
            catalog.insert(
                MediaId::from(id),
                MediaInfo {
                    media_id: MediaId::from(id),
                    title: title.to_owned(),
                    artist: artist.to_owned(),
                    duration_secs,
                },
            );
        }
        Self {
            catalog: RwLock::new(catalog),
        }
    }
}

#[async_trait]
impl MediaResolver for InMemoryMedia {
    async fn resolve(&self, media_id: &MediaId) -> Result<MediaInfo, DomainError> {
        self.catalog.read().await.get(media_id).cloned().ok_or(DomainError::MediaNotFound)
    }

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<MediaInfo>, DomainError> {
        let needle = query.to_lowercase();
        Ok(self
            .catalog
            .read()
            .await
            .values()
            .filter(|info| info.title.to_lowercase().contains(&needle) || info.artist.to_lowercase().contains(&needle))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn stream_url(&self, media_id: &MediaId) -> Result<String, DomainError> {
        self.resolve(media_id).await.map(|info| format!("https://media.example/stream/{}", info.media_id))
    }
}

#[derive(Default)]
pub struct InMemoryPresence {
    sessions: RwLock<HashMap<UserId, SessionRecord>>,
    room_audiences: RwLock<HashMap<RoomId, std::collections::HashSet<UserId>>>,
}

#[async_trait]
impl PresenceRegistry for InMemoryPresence {
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
        Ok(self.room_audiences.read().await.get(room_id).map(|set| set.iter().cloned().collect()).unwrap_or_default())
    }

    async fn add_to_room_audience(&self, room_id: &RoomId, user_id: &UserId) -> Result<(), DomainError> {
        self.room_audiences.write().await.entry(*room_id).or_default().insert(user_id.clone());
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

/// Bundles the concrete stores behind `Arc` so `AppState` can hand each
/// trait object out independently.
pub struct Stores {
    pub auth: Arc<InMemoryAuth>,
    pub rooms: Arc<InMemoryRooms>,
    pub users: Arc<InMemoryUsers>,
    pub playlists: Arc<InMemoryPlaylists>,
    pub media: Arc<InMemoryMedia>,
    pub presence: Arc<InMemoryPresence>,
}

impl Default for Stores {
    fn default() -> Self {
        Self {
            auth: Arc::new(InMemoryAuth::default()),
            rooms: Arc::new(InMemoryRooms::default()),
            users: Arc::new(InMemoryUsers::default()),
            playlists: Arc::new(InMemoryPlaylists::default()),
            media: Arc::new(InMemoryMedia::default()),
            presence: Arc::new(InMemoryPresence::default()),
        }
    }
}
