//! Room manager (§4.G): room CRUD backed by [`RoomRepository`], plus the
//! in-process runtime state (audience, DJ queue) each room accrues once a
//! client joins it.
//!
//! Grounded on `services/server/src/state.rs`'s `AppState` registries —
//! `Arc<RwLock<HashMap<_, _>>>` again, this time keyed by `RoomId` and
//! holding a `Mutex` per room rather than a plain value, since §5 calls
//! for "per-room mutex; acquisition order is room-lock → hub-lock."

pub mod state;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use std::time::Duration;

use turntable_protocol::methods::room::RoomSettings;
use turntable_protocol::{Notification, RoomId, UserId};

use crate::error::DomainError;
use crate::hub::Hub;
use crate::presence::PresenceRegistry;
use crate::repository::{RoomRecord, RoomRepository, RoomSearchQuery, RoomUpdate};
use state::{QueueError, RoomRuntimeState};

/// Track reaper cadence: how often every room's runtime state is polled for
/// a duration-elapsed track or a DJ who let the grace window lapse (§4.H).
/// Short relative to [`crate::maintenance::MAINTENANCE_INTERVAL`] since a
/// stalled room should resume within a second or two, not minutes.
pub const TRACK_REAP_INTERVAL: Duration = Duration::from_millis(500);

/// Owns the persisted `RoomRepository` and the in-process runtime state
/// map. Created once per process and shared behind an `Arc` by the
/// session server and the router's handlers.
pub struct RoomManager {
    repository: Arc<dyn RoomRepository>,
    hub: Hub,
    presence: Arc<dyn PresenceRegistry>,
    runtime: RwLock<HashMap<RoomId, Arc<Mutex<RoomRuntimeState>>>>,
}

impl RoomManager {
    #[must_use]
    pub fn new(repository: Arc<dyn RoomRepository>, hub: Hub, presence: Arc<dyn PresenceRegistry>) -> Self {
        Self {
            repository,
            hub,
            presence,
            runtime: RwLock::new(HashMap::new()),
        }
    }

    async fn runtime_for(&self, room_id: RoomId) -> Arc<Mutex<RoomRuntimeState>> {
        if let Some(state) = self.runtime.read().await.get(&room_id) {
            return state.clone();
        }
        let mut runtime = self.runtime.write().await;
        runtime
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(RoomRuntimeState::default())))
            .clone()
    }

    pub async fn create(&self, slug: &str, name: &str, description: &str, creator_id: &UserId, settings: RoomSettings) -> Result<RoomRecord, DomainError> {
        self.repository.create(slug, name, description, creator_id, settings).await
    }

    pub async fn get(&self, room_id: &RoomId) -> Result<RoomRecord, DomainError> {
        self.repository.get(room_id).await
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<RoomRecord, DomainError> {
        self.repository.get_by_slug(slug).await
    }

    /// §4.G Update: only the creator or a moderator may update.
    pub async fn update(&self, room_id: &RoomId, caller: &UserId, patch: RoomUpdate) -> Result<RoomRecord, DomainError> {
        let room = self.repository.get(room_id).await?;
        if room.creator_id != *caller && !room.moderator_ids.contains(caller) {
            return Err(DomainError::NotAuthorized);
        }
        self.repository.update(room_id, patch).await
    }

    /// §4.G Delete: creator only. Evicts every member before dropping
    /// runtime state, so each gets a `user:room_leave`.
    pub async fn delete(&self, room_id: &RoomId, caller: &UserId) -> Result<(), DomainError> {
        let room = self.repository.get(room_id).await?;
        if room.creator_id != *caller {
            return Err(DomainError::NotAuthorized);
        }
        let members = {
            let runtime = self.runtime_for(*room_id).await;
            let state = runtime.lock().await;
            state.audience.iter().cloned().collect::<Vec<_>>()
        };
        for member in &members {
            self.leave(room_id, member).await?;
        }
        self.runtime.write().await.remove(room_id);
        self.repository.delete(room_id).await
    }

    /// §4.G Join: idempotent, checks closed/full/banned, updates audience
    /// and presence, emits `user:room_join`.
    pub async fn join(&self, room_id: &RoomId, user_id: &UserId) -> Result<(), DomainError> {
        let room = self.repository.get(room_id).await?;
        if !room.active {
            return Err(DomainError::RoomClosed);
        }
        if room.banned_user_ids.contains(user_id) {
            return Err(DomainError::UserBanned);
        }

        let runtime = self.runtime_for(*room_id).await;
        let already_joined = {
            let mut state = runtime.lock().await;
            if state.audience.contains(user_id) {
                true
            } else {
                if state.audience.len() as u32 >= room.settings.capacity {
                    return Err(DomainError::RoomFull);
                }
                state.audience.insert(user_id.clone());
                false
            }
        };

        if !already_joined {
            self.hub
                .broadcast_to_room(
                    *room_id,
                    &notification_json(Notification::UserRoomJoin {
                        room_id: *room_id,
                        user_id: user_id.clone(),
                    }),
                )
                .await;
            self.presence.touch(user_id, Some(*room_id)).await?;
            self.presence.add_to_room_audience(room_id, user_id).await?;
        }
        Ok(())
    }

    /// §4.G Leave: removes from audience and queue, advances the DJ slot
    /// if the leaver was playing, emits `user:room_leave`, clears
    /// presence `currentRoom`.
    ///
    /// Tie-break policy (§4.H): the advance is applied, and its
    /// notifications enqueued, before `user:room_leave` is broadcast for
    /// the same leave. If the leaver is the current DJ with a track
    /// playing, the departure is itself a skip (§8 S2): it goes through
    /// [`RoomRuntimeState::skip_current_media`] with reason `"dj_left"`
    /// so the closed history entry is marked `skipped = true` and
    /// observers see `track:skip` before `queue:updated`, exactly as a
    /// moderator-initiated skip would. A DJ who leaves before ever
    /// playing anything (or a non-DJ leaving the queue) takes the plain
    /// [`RoomRuntimeState::remove_from_queue`] path instead, since there
    /// is no playing track to close out.
    pub async fn leave(&self, room_id: &RoomId, user_id: &UserId) -> Result<(), DomainError> {
        let runtime = self.runtime_for(*room_id).await;
        let mut notifications = {
            let mut state = runtime.lock().await;
            state.audience.remove(user_id);
            if state.dj.as_ref() == Some(user_id) && state.playing.is_some() {
                state
                    .skip_current_media(Some("dj_left".to_owned()), *room_id)
                    .expect("playing.is_some() was just checked")
            } else {
                state.remove_from_queue(user_id, *room_id)
            }
        };
        notifications.push(Notification::UserRoomLeave {
            room_id: *room_id,
            user_id: user_id.clone(),
        });

        for notification in notifications {
            self.hub.broadcast_to_room(*room_id, &notification_json(notification)).await;
        }
        self.presence.remove_from_room_audience(room_id, user_id).await?;
        self.presence.touch(user_id, None).await?;
        Ok(())
    }

    pub async fn is_user_in_room(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        let runtime = self.runtime_for(*room_id).await;
        runtime.lock().await.audience.contains(user_id)
    }

    pub async fn search(&self, query: &RoomSearchQuery) -> Result<(Vec<RoomRecord>, u64), DomainError> {
        self.repository.search(query).await
    }

    pub async fn runtime_snapshot(&self, room_id: RoomId) -> Arc<Mutex<RoomRuntimeState>> {
        self.runtime_for(room_id).await
    }

    /// §4.H: polls every room with runtime state for a track whose duration
    /// has elapsed or a DJ stalled past the play grace window, applies
    /// whichever transition applies, and broadcasts the result. Run
    /// periodically by [`RoomManager::run_track_reaper`].
    pub async fn reap_expired_tracks(&self) {
        let room_ids: Vec<RoomId> = self.runtime.read().await.keys().copied().collect();
        for room_id in room_ids {
            let runtime = self.runtime_for(room_id).await;
            let notifications = {
                let mut state = runtime.lock().await;
                state.reap_if_expired(room_id)
            };
            for notification in notifications {
                self.hub.broadcast_to_room(room_id, &notification_json(notification)).await;
            }
        }
    }

    /// Runs [`RoomManager::reap_expired_tracks`] on [`TRACK_REAP_INTERVAL`]
    /// until `shutdown` fires. Intended to be spawned once at session
    /// server startup alongside [`crate::Maintenance::run`].
    pub async fn run_track_reaper(self: Arc<Self>, shutdown: crate::context::CancellationToken) {
        let mut interval = tokio::time::interval(TRACK_REAP_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.reap_expired_tracks().await;
                }
                () = shutdown.cancelled() => {
                    return;
                }
            }
        }
    }

    /// Reads a projection of a room's runtime state without producing any
    /// notifications — the counterpart to [`RoomManager::with_queue`] for
    /// the read-only half of the queue/chat RPC surface.
    pub async fn read_room<F, T>(&self, room_id: RoomId, f: F) -> T
    where
        F: FnOnce(&RoomRuntimeState) -> T,
    {
        let runtime = self.runtime_for(room_id).await;
        let state = runtime.lock().await;
        f(&state)
    }

    /// Applies a queue/voting transition under the room's lock, then
    /// broadcasts every notification it produced. Callers pass a closure
    /// operating on the exclusively-held [`RoomRuntimeState`], mirroring
    /// the "room-lock → hub-lock" ordering §5 requires.
    pub async fn with_queue<F>(&self, room_id: RoomId, op: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut RoomRuntimeState) -> Result<Vec<Notification>, QueueError>,
    {
        let runtime = self.runtime_for(room_id).await;
        let notifications = {
            let mut state = runtime.lock().await;
            op(&mut state)?
        };
        for notification in notifications {
            self.hub.broadcast_to_room(room_id, &notification_json(notification)).await;
        }
        Ok(())
    }
}

fn notification_json(notification: Notification) -> String {
    turntable_protocol::NotificationFrame::new(notification)
        .to_json()
        .expect("notification payloads are always serializable")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::fakes::InMemoryPresenceRegistry;
    use crate::repository::fakes::InMemoryRoomRepository;

    fn settings() -> RoomSettings {
        RoomSettings {
            capacity: 2,
            theme: None,
            chat_rules: None,
        }
    }

    async fn manager() -> (RoomManager, Hub) {
        let hub = Hub::new();
        let manager = RoomManager::new(
            Arc::new(InMemoryRoomRepository::default()),
            hub.clone(),
            Arc::new(InMemoryPresenceRegistry::default()),
        );
        (manager, hub)
    }

    #[tokio::test]
    async fn joining_twice_is_idempotent() {
        let (manager, _hub) = manager().await;
        let owner = UserId::from("owner");
        let room = manager.create("r1", "Room", "", &owner, settings()).await.unwrap();

        manager.join(&room.id, &owner).await.unwrap();
        manager.join(&room.id, &owner).await.unwrap();
        assert!(manager.is_user_in_room(&room.id, &owner).await);
    }

    #[tokio::test]
    async fn join_fails_once_audience_reaches_capacity() {
        let (manager, _hub) = manager().await;
        let owner = UserId::from("owner");
        let room = manager.create("r1", "Room", "", &owner, settings()).await.unwrap();

        manager.join(&room.id, &UserId::from("a")).await.unwrap();
        manager.join(&room.id, &UserId::from("b")).await.unwrap();
        let result = manager.join(&room.id, &UserId::from("c")).await;
        assert!(matches!(result, Err(DomainError::RoomFull)));
    }

    #[tokio::test]
    async fn only_the_creator_may_delete_a_room() {
        let (manager, _hub) = manager().await;
        let owner = UserId::from("owner");
        let room = manager.create("r1", "Room", "", &owner, settings()).await.unwrap();

        let result = manager.delete(&room.id, &UserId::from("stranger")).await;
        assert!(matches!(result, Err(DomainError::NotAuthorized)));
    }

    #[tokio::test]
    async fn leaving_while_playing_dj_advances_before_user_room_leave_is_observed() {
        let (manager, _hub) = manager().await;
        let owner = UserId::from("owner");
        let room = manager.create("r1", "Room", "", &owner, settings()).await.unwrap();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        manager.join(&room.id, &alice).await.unwrap();
        manager.join(&room.id, &bob).await.unwrap();

        manager
            .with_queue(room.id, |state| state.add_to_queue(&alice, room.id))
            .await
            .unwrap();
        manager
            .with_queue(room.id, |state| state.add_to_queue(&bob, room.id))
            .await
            .unwrap();

        manager.leave(&room.id, &alice).await.unwrap();

        let runtime = manager.runtime_snapshot(room.id).await;
        let state = runtime.lock().await;
        assert_eq!(state.dj, Some(bob));
    }

    #[tokio::test]
    async fn dj_leaving_mid_track_is_a_skip_not_a_plain_removal() {
        use turntable_protocol::{MediaId, MediaInfo};

        let (manager, _hub) = manager().await;
        let owner = UserId::from("owner");
        let room = manager.create("r1", "Room", "", &owner, settings()).await.unwrap();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        manager.join(&room.id, &alice).await.unwrap();
        manager.join(&room.id, &bob).await.unwrap();

        manager
            .with_queue(room.id, |state| state.add_to_queue(&alice, room.id))
            .await
            .unwrap();
        manager
            .with_queue(room.id, |state| state.add_to_queue(&bob, room.id))
            .await
            .unwrap();
        manager
            .with_queue(room.id, |state| {
                state.play_media(
                    &alice,
                    MediaInfo {
                        media_id: MediaId::from("m1"),
                        title: "Track".to_owned(),
                        artist: "Artist".to_owned(),
                        duration_secs: 200,
                    },
                    room.id,
                )
            })
            .await
            .unwrap();

        manager.leave(&room.id, &alice).await.unwrap();

        let runtime = manager.runtime_snapshot(room.id).await;
        let state = runtime.lock().await;
        assert_eq!(state.dj, Some(bob));
        assert!(state.playing.is_none());
        let entry = state.history.front().expect("closed track recorded in history");
        assert!(entry.skipped);
        assert_eq!(entry.media_id, MediaId::from("m1"));
    }

    #[tokio::test]
    async fn reap_expired_tracks_completes_a_track_whose_duration_has_elapsed() {
        use turntable_protocol::{MediaId, MediaInfo};

        let (manager, _hub) = manager().await;
        let owner = UserId::from("owner");
        let room = manager.create("r1", "Room", "", &owner, settings()).await.unwrap();
        let alice = UserId::from("alice");
        manager.join(&room.id, &alice).await.unwrap();

        manager
            .with_queue(room.id, |state| state.add_to_queue(&alice, room.id))
            .await
            .unwrap();
        manager
            .with_queue(room.id, |state| {
                state.play_media(
                    &alice,
                    MediaInfo {
                        media_id: MediaId::from("m1"),
                        title: "Track".to_owned(),
                        artist: "Artist".to_owned(),
                        duration_secs: 0,
                    },
                    room.id,
                )
            })
            .await
            .unwrap();

        manager.reap_expired_tracks().await;

        let runtime = manager.runtime_snapshot(room.id).await;
        let state = runtime.lock().await;
        assert!(state.playing.is_none());
        let entry = state.history.front().expect("completed track recorded in history");
        assert!(!entry.skipped);
    }
}
