//! `room.*` methods: CRUD over the persisted room record plus the
//! join/leave/query surface over its in-process runtime state.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use turntable_core::context::RequestContext;
use turntable_core::error::DomainError;
use turntable_core::repository::{RoomRecord, RoomSearchQuery, RoomUpdate};
use turntable_core::router::Handler;
use turntable_core::Client;
use turntable_protocol::methods::room::{
    CreateParams, CreateResult, DeleteParams, DeleteResult, GetActiveResult, GetBySlugParams, GetBySlugResult, GetParams, GetPopularParams, GetPopularResult, GetResult, GetStateParams,
    GetStateResult, GetUsersParams, GetUsersResult, IsUserInRoomParams, IsUserInRoomResult, JoinParams, JoinResult, LeaveParams, LeaveResult, RoomSummary, SearchParams, SearchResult, SortOrder,
    UpdateParams, UpdateResult,
};
use turntable_protocol::notification::RoomStateSnapshot;

use crate::state::AppState;

use super::parse_params;

/// A page large enough to back `getActive`/`getPopular` against the room
/// repository's `search`, which has no dedicated "all active rooms" query.
const ALL_ROOMS_PAGE: u32 = 1000;

fn summary_of(record: &RoomRecord) -> RoomSummary {
    RoomSummary {
        id: record.id,
        slug: record.slug.clone(),
        name: record.name.clone(),
        description: record.description.clone(),
        creator_id: record.creator_id.clone(),
        moderator_ids: record.moderator_ids.iter().cloned().collect(),
        settings: record.settings.clone(),
        active: record.active,
        created_at: record.created_at,
    }
}

fn caller_of(ctx: &RequestContext) -> Result<turntable_protocol::UserId, DomainError> {
    ctx.claims().user_id.clone().ok_or(DomainError::AuthenticationRequired)
}

struct Create {
    state: AppState,
}

#[async_trait]
impl Handler for Create {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: CreateParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        let record = self.state.rooms.create(&params.slug, &params.name, &params.description, &caller, params.settings).await?;
        Ok(serde_json::to_value(summary_of(&record) as CreateResult).expect("create room result always serializes"))
    }
}

struct Get {
    state: AppState,
}

#[async_trait]
impl Handler for Get {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetParams = parse_params(params)?;
        let record = self.state.rooms.get(&params.room_id).await?;
        Ok(serde_json::to_value(summary_of(&record) as GetResult).expect("get room result always serializes"))
    }
}

struct GetBySlug {
    state: AppState,
}

#[async_trait]
impl Handler for GetBySlug {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetBySlugParams = parse_params(params)?;
        let record = self.state.rooms.get_by_slug(&params.slug).await?;
        Ok(serde_json::to_value(summary_of(&record) as GetBySlugResult).expect("get room by slug result always serializes"))
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
        let record = self
            .state
            .rooms
            .update(
                &params.room_id,
                &caller,
                RoomUpdate {
                    name: params.name,
                    description: params.description,
                    settings: params.settings,
                },
            )
            .await?;
        Ok(serde_json::to_value(summary_of(&record) as UpdateResult).expect("update room result always serializes"))
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
        self.state.rooms.delete(&params.room_id, &caller).await?;
        Ok(serde_json::to_value(DeleteResult { deleted: true }).expect("delete room result always serializes"))
    }
}

struct Join {
    state: AppState,
}

#[async_trait]
impl Handler for Join {
    /// Registers the connection in the hub's room index *before* calling
    /// [`turntable_core::RoomManager::join`], not after: the domain-level
    /// join broadcasts `user:room_join` to every hub member of the room as
    /// part of the same call, so the joiner has to already be one of those
    /// members to receive its own notification (§8 S1). Rolled back via
    /// `hub.leave_room` if the domain join is rejected (room closed, full,
    /// or the caller is banned), so a failed join never leaves a client
    /// registered against a room it isn't actually in.
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: JoinParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        self.state.hub.join_room(ctx.client_id(), params.room_id).await;
        if let Err(error) = self.state.rooms.join(&params.room_id, &caller).await {
            self.state.hub.leave_room(ctx.client_id()).await;
            return Err(error);
        }
        let room = self.state.rooms.get(&params.room_id).await?;
        let state = self.state.rooms.read_room(params.room_id, snapshot_of).await;
        Ok(serde_json::to_value(JoinResult {
            room: summary_of(&room),
            state,
        })
        .expect("join room result always serializes"))
    }
}

struct Leave {
    state: AppState,
}

#[async_trait]
impl Handler for Leave {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: LeaveParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        self.state.rooms.leave(&params.room_id, &caller).await?;
        self.state.hub.leave_room(ctx.client_id()).await;
        Ok(serde_json::to_value(LeaveResult { left: true }).expect("leave room result always serializes"))
    }
}

struct GetUsers {
    state: AppState,
}

#[async_trait]
impl Handler for GetUsers {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetUsersParams = parse_params(params)?;
        let users = self.state.rooms.read_room(params.room_id, |state| state.audience.iter().cloned().collect()).await;
        Ok(serde_json::to_value(GetUsersResult { users }).expect("get room users result always serializes"))
    }
}

struct IsUserInRoom {
    state: AppState,
}

#[async_trait]
impl Handler for IsUserInRoom {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: IsUserInRoomParams = parse_params(params)?;
        let in_room = self.state.rooms.is_user_in_room(&params.room_id, &params.user_id).await;
        Ok(serde_json::to_value(IsUserInRoomResult { in_room }).expect("is user in room result always serializes"))
    }
}

fn snapshot_of(state: &turntable_core::RoomRuntimeState) -> RoomStateSnapshot {
    RoomStateSnapshot {
        dj: state.dj.clone(),
        playing: state.playing.clone(),
        queue: state.queue.clone(),
        audience_count: state.audience.len(),
    }
}

struct GetState {
    state: AppState,
}

#[async_trait]
impl Handler for GetState {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetStateParams = parse_params(params)?;
        let snapshot = self.state.rooms.read_room(params.room_id, snapshot_of).await;
        Ok(serde_json::to_value(snapshot as GetStateResult).expect("get room state result always serializes"))
    }
}

struct Search {
    state: AppState,
}

#[async_trait]
impl Handler for Search {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: SearchParams = parse_params(params)?;
        let query = RoomSearchQuery {
            text: if params.query.is_empty() { None } else { Some(params.query) },
            limit: params.limit,
            skip: params.skip,
        };
        let (mut rooms, total) = self.state.rooms.search(&query).await?;
        if matches!(params.sort, Some(SortOrder::Alphabetical)) {
            rooms.sort_by(|a, b| a.name.cmp(&b.name));
        }
        Ok(serde_json::to_value(SearchResult {
            rooms: rooms.iter().map(summary_of).collect(),
            total,
        })
        .expect("search rooms result always serializes"))
    }
}

struct GetActive {
    state: AppState,
}

#[async_trait]
impl Handler for GetActive {
    async fn call(&self, _ctx: RequestContext, _client: Client, _params: Option<Value>) -> Result<Value, DomainError> {
        let (rooms, _total) = self
            .state
            .rooms
            .search(&RoomSearchQuery {
                text: None,
                limit: ALL_ROOMS_PAGE,
                skip: 0,
            })
            .await?;
        let rooms = rooms.iter().filter(|r| r.active).map(summary_of).collect();
        Ok(serde_json::to_value(GetActiveResult { rooms }).expect("get active rooms result always serializes"))
    }
}

struct GetPopular {
    state: AppState,
}

#[async_trait]
impl Handler for GetPopular {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetPopularParams = parse_params(params)?;
        let (rooms, _total) = self
            .state
            .rooms
            .search(&RoomSearchQuery {
                text: None,
                limit: ALL_ROOMS_PAGE,
                skip: 0,
            })
            .await?;
        let mut by_audience = Vec::with_capacity(rooms.len());
        for room in rooms.iter().filter(|r| r.active) {
            let audience = self.state.rooms.read_room(room.id, |state| state.audience.len()).await;
            by_audience.push((audience, summary_of(room)));
        }
        by_audience.sort_by(|a, b| b.0.cmp(&a.0));
        by_audience.truncate(params.limit as usize);
        Ok(serde_json::to_value(GetPopularResult {
            rooms: by_audience.into_iter().map(|(_, room)| room).collect(),
        })
        .expect("get popular rooms result always serializes"))
    }
}

pub(crate) async fn register(state: &AppState) {
    super::register(&state.router, "room.create", true, Arc::new(Create { state: state.clone() })).await;
    super::register(&state.router, "room.get", true, Arc::new(Get { state: state.clone() })).await;
    super::register(&state.router, "room.getBySlug", true, Arc::new(GetBySlug { state: state.clone() })).await;
    super::register(&state.router, "room.update", true, Arc::new(Update { state: state.clone() })).await;
    super::register(&state.router, "room.delete", true, Arc::new(Delete { state: state.clone() })).await;
    super::register(&state.router, "room.join", true, Arc::new(Join { state: state.clone() })).await;
    super::register(&state.router, "room.leave", true, Arc::new(Leave { state: state.clone() })).await;
    super::register(&state.router, "room.getUsers", true, Arc::new(GetUsers { state: state.clone() })).await;
    super::register(&state.router, "room.isUserInRoom", true, Arc::new(IsUserInRoom { state: state.clone() })).await;
    super::register(&state.router, "room.getState", true, Arc::new(GetState { state: state.clone() })).await;
    super::register(&state.router, "room.search", true, Arc::new(Search { state: state.clone() })).await;
    super::register(&state.router, "room.getActive", true, Arc::new(GetActive { state: state.clone() })).await;
    super::register(&state.router, "room.getPopular", true, Arc::new(GetPopular { state: state.clone() })).await;
}
