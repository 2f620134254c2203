//! Process-wide application state: the Hub, room manager, router, and the
//! capability trait objects every RPC handler closes over.
//!
//! A plain struct of `Arc`-shared registries, constructed once in `main`
//! and cloned into every connection task via axum's `State` extractor.

use std::sync::Arc;
use std::time::Duration;

use turntable_core::auth::AuthProvider;
use turntable_core::context::CancellationToken;
use turntable_core::media::MediaResolver;
use turntable_core::presence::PresenceRegistry;
use turntable_core::repository::{PlaylistRepository, RoomRepository, UserRepository};
use turntable_core::{Hub, Maintenance, Router};

use crate::memory::Stores;

/// Per-request timeout handed to every [`turntable_core::RequestContext`]
/// (Design Notes §9 "deadline propagation"). Not specified numerically by
/// the protocol; generous enough that only a genuinely stuck handler trips
/// it.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub router: Router,
    pub rooms: Arc<turntable_core::RoomManager>,
    pub auth: Arc<dyn AuthProvider>,
    pub accounts: Arc<crate::memory::InMemoryAuth>,
    pub users: Arc<dyn UserRepository>,
    pub user_accounts: Arc<crate::memory::InMemoryUsers>,
    pub playlists: Arc<dyn PlaylistRepository>,
    pub media: Arc<dyn MediaResolver>,
    pub presence: Arc<dyn PresenceRegistry>,
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Builds every registry and wires the full `§6` method table onto the
    /// router before returning — callers never see a half-registered
    /// [`Router`]. Async because [`crate::rpc::register_all`] closes over
    /// `&AppState`, which can't exist until the registries it wraps do.
    pub async fn new() -> Self {
        let stores = Stores::default();
        let hub = Hub::new();
        let presence: Arc<dyn PresenceRegistry> = stores.presence.clone();
        let rooms = Arc::new(turntable_core::RoomManager::new(stores.rooms.clone(), hub.clone(), presence.clone()));
        let router = crate::rpc::build_router();
        let state = Self {
            hub,
            router,
            rooms,
            auth: stores.auth.clone(),
            accounts: stores.auth,
            users: stores.users.clone(),
            user_accounts: stores.users,
            playlists: stores.playlists,
            media: stores.media,
            presence,
            shutdown: CancellationToken::new(),
        };
        crate::rpc::register_all(&state).await;
        state
    }

    /// Spawns the §4.J reconciliation task, running once immediately and
    /// then on [`turntable_core::maintenance::MAINTENANCE_INTERVAL`], plus
    /// the §4.H track reaper that auto-completes elapsed tracks and
    /// advances past stalled DJs on [`turntable_core::room::TRACK_REAP_INTERVAL`].
    pub fn spawn_maintenance(&self) {
        let maintenance = Arc::new(Maintenance::new(self.presence.clone(), self.rooms.clone(), self.hub.clone()));
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            maintenance.reconcile_once().await;
            maintenance.run(shutdown).await;
        });

        let rooms = self.rooms.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            rooms.run_track_reaper(shutdown).await;
        });
    }
}

