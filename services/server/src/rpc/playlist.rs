//! `playlist.*` methods over [`turntable_core::repository::PlaylistRepository`].
//! The repository trait takes no caller argument, so ownership checks for
//! mutating operations live here, the same pattern `room.rs` uses for
//! `RoomManager::update`/`delete`.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;

use turntable_core::context::RequestContext;
use turntable_core::error::DomainError;
use turntable_core::repository::PlaylistRecord;
use turntable_core::router::Handler;
use turntable_core::Client;
use turntable_protocol::methods::playlist::{
    AddItemParams, AddItemResult, CreateParams, CreateResult, DeleteParams, DeleteResult, GetActiveResult, GetParams, GetResult, GetUserPlaylistsResult, ImportParams, ImportResult, PlaylistSummary,
    RemoveItemParams, RemoveItemResult, SearchParams, SearchResult, SetActiveParams, SetActiveResult, ShuffleParams, ShuffleResult, UpdateParams, UpdateResult,
};

use crate::state::AppState;

use super::parse_params;

fn caller_of(ctx: &RequestContext) -> Result<turntable_protocol::UserId, DomainError> {
    ctx.claims().user_id.clone().ok_or(DomainError::AuthenticationRequired)
}

fn summary_of(record: &PlaylistRecord) -> PlaylistSummary {
    PlaylistSummary {
        id: record.id.clone(),
        owner_id: record.owner_id.clone(),
        name: record.name.clone(),
        items: record.items.clone(),
        active: record.active,
    }
}

async fn owned_or_forbidden(state: &AppState, playlist_id: &turntable_protocol::PlaylistId, caller: &turntable_protocol::UserId) -> Result<PlaylistRecord, DomainError> {
    let record = state.playlists.get(playlist_id).await?;
    if record.owner_id != *caller {
        return Err(DomainError::NotAuthorized);
    }
    Ok(record)
}

struct Create {
    state: AppState,
}

#[async_trait]
impl Handler for Create {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: CreateParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        let record = self.state.playlists.create(&caller, &params.name, params.items).await?;
        Ok(serde_json::to_value(summary_of(&record) as CreateResult).expect("create playlist result always serializes"))
    }
}

struct Get {
    state: AppState,
}

#[async_trait]
impl Handler for Get {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetParams = parse_params(params)?;
        let record = self.state.playlists.get(&params.playlist_id).await?;
        Ok(serde_json::to_value(summary_of(&record) as GetResult).expect("get playlist result always serializes"))
    }
}

struct GetUserPlaylists {
    state: AppState,
}

#[async_trait]
impl Handler for GetUserPlaylists {
    async fn call(&self, ctx: RequestContext, _client: Client, _params: Option<Value>) -> Result<Value, DomainError> {
        let caller = caller_of(&ctx)?;
        let records = self.state.playlists.get_for_owner(&caller).await?;
        Ok(serde_json::to_value(GetUserPlaylistsResult {
            playlists: records.iter().map(summary_of).collect(),
        })
        .expect("get user playlists result always serializes"))
    }
}

struct Update {
    state: AppState,
}

#[async_trait]
impl Handler for Update {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: UpdateParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        let record = owned_or_forbidden(&self.state, &params.playlist_id, &caller).await?;
        let record = if let Some(name) = params.name {
            self.state.playlists.rename(&params.playlist_id, &name).await?
        } else {
            record
        };
        Ok(serde_json::to_value(summary_of(&record) as UpdateResult).expect("update playlist result always serializes"))
    }
}

struct Delete {
    state: AppState,
}

#[async_trait]
impl Handler for Delete {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: DeleteParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        owned_or_forbidden(&self.state, &params.playlist_id, &caller).await?;
        self.state.playlists.delete(&params.playlist_id).await?;
        Ok(serde_json::to_value(DeleteResult { deleted: true }).expect("delete playlist result always serializes"))
    }
}

struct AddItem {
    state: AppState,
}

#[async_trait]
impl Handler for AddItem {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: AddItemParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        owned_or_forbidden(&self.state, &params.playlist_id, &caller).await?;
        let record = self.state.playlists.add_item(&params.playlist_id, params.item).await?;
        Ok(serde_json::to_value(summary_of(&record) as AddItemResult).expect("add playlist item result always serializes"))
    }
}

struct RemoveItem {
    state: AppState,
}

#[async_trait]
impl Handler for RemoveItem {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: RemoveItemParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        owned_or_forbidden(&self.state, &params.playlist_id, &caller).await?;
        let record = self.state.playlists.remove_item(&params.playlist_id, params.media_id.as_str()).await?;
        Ok(serde_json::to_value(summary_of(&record) as RemoveItemResult).expect("remove playlist item result always serializes"))
    }
}

/// No external fetch capability is in scope (§1 non-goal territory this
/// deployment inherits from [`turntable_core::media::MediaResolver`]), so
/// `source_url` is accepted and ignored rather than pretending to import
/// anything from it — the playlist comes back unchanged.
struct Import {
    state: AppState,
}

#[async_trait]
impl Handler for Import {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: ImportParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        let record = owned_or_forbidden(&self.state, &params.playlist_id, &caller).await?;
        let _ = params.source_url;
        Ok(serde_json::to_value(summary_of(&record) as ImportResult).expect("import playlist result always serializes"))
    }
}

struct SetActive {
    state: AppState,
}

#[async_trait]
impl Handler for SetActive {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: SetActiveParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        owned_or_forbidden(&self.state, &params.playlist_id, &caller).await?;
        self.state.playlists.set_active(&caller, &params.playlist_id).await?;
        Ok(serde_json::to_value(SetActiveResult { ok: true }).expect("set active playlist result always serializes"))
    }
}

struct GetActive {
    state: AppState,
}

#[async_trait]
impl Handler for GetActive {
    async fn call(&self, ctx: RequestContext, _client: Client, _params: Option<Value>) -> Result<Value, DomainError> {
        let caller = caller_of(&ctx)?;
        let record = self.state.playlists.get_active(&caller).await?;
        Ok(serde_json::to_value(GetActiveResult {
            playlist: record.as_ref().map(summary_of),
        })
        .expect("get active playlist result always serializes"))
    }
}

struct Shuffle {
    state: AppState,
}

#[async_trait]
impl Handler for Shuffle {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: ShuffleParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        let record = owned_or_forbidden(&self.state, &params.playlist_id, &caller).await?;
        let mut items = record.items;
        {
            let mut rng = rand::rng();
            for i in (1..items.len()).rev() {
                let j = rng.random_range(0..=i);
                items.swap(i, j);
            }
        }
        let record = self.state.playlists.replace_items(&params.playlist_id, items).await?;
        Ok(serde_json::to_value(summary_of(&record) as ShuffleResult).expect("shuffle playlist result always serializes"))
    }
}

struct Search {
    state: AppState,
}

#[async_trait]
impl Handler for Search {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: SearchParams = parse_params(params)?;
        let records = self.state.playlists.search(&params.query, params.limit).await?;
        Ok(serde_json::to_value(SearchResult {
            playlists: records.iter().map(summary_of).collect(),
        })
        .expect("search playlists result always serializes"))
    }
}

pub(crate) async fn register(state: &AppState) {
    super::register(&state.router, "playlist.create", true, Arc::new(Create { state: state.clone() })).await;
    super::register(&state.router, "playlist.get", true, Arc::new(Get { state: state.clone() })).await;
    super::register(&state.router, "playlist.getUserPlaylists", true, Arc::new(GetUserPlaylists { state: state.clone() })).await;
    super::register(&state.router, "playlist.update", true, Arc::new(Update { state: state.clone() })).await;
    super::register(&state.router, "playlist.delete", true, Arc::new(Delete { state: state.clone() })).await;
    super::register(&state.router, "playlist.addItem", true, Arc::new(AddItem { state: state.clone() })).await;
    super::register(&state.router, "playlist.removeItem", true, Arc::new(RemoveItem { state: state.clone() })).await;
    super::register(&state.router, "playlist.import", true, Arc::new(Import { state: state.clone() })).await;
    super::register(&state.router, "playlist.setActive", true, Arc::new(SetActive { state: state.clone() })).await;
    super::register(&state.router, "playlist.getActive", true, Arc::new(GetActive { state: state.clone() })).await;
    super::register(&state.router, "playlist.shuffle", true, Arc::new(Shuffle { state: state.clone() })).await;
    super::register(&state.router, "playlist.search", true, Arc::new(Search { state: state.clone() })).await;
}
