//! `queue.*` methods: the DJ queue and its vote/skip/clear/shuffle
//! transitions, all applied through [`turntable_core::RoomManager`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use turntable_core::context::RequestContext;
use turntable_core::error::DomainError;
use turntable_core::room::state::RoomRuntimeState;
use turntable_core::router::Handler;
use turntable_core::Client;
use turntable_protocol::methods::queue::{
    AdvanceParams, BoolResult, ClearParams, GetCurrentDjParams, GetCurrentDjResult, GetCurrentMediaParams, GetCurrentMediaResult, GetHistoryParams, GetHistoryResult, GetParams, GetPositionParams,
    GetPositionResult, IsCurrentDjParams, IsInQueueParams, JoinParams, LeaveParams, MoveParams, PlayMediaParams, ShuffleParams, SkipParams, VoteParams,
};

use crate::state::AppState;

use super::parse_params;

fn caller_of(ctx: &RequestContext) -> Result<turntable_protocol::UserId, DomainError> {
    ctx.claims().user_id.clone().ok_or(DomainError::AuthenticationRequired)
}

async fn is_moderator(state: &AppState, room_id: turntable_protocol::RoomId, user_id: &turntable_protocol::UserId) -> Result<bool, DomainError> {
    let room = state.rooms.get(&room_id).await?;
    let moderator_ids: Vec<_> = room.moderator_ids.into_iter().collect();
    Ok(RoomRuntimeState::is_moderator(&moderator_ids, user_id))
}

struct Join {
    state: AppState,
}

#[async_trait]
impl Handler for Join {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: JoinParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        self.state.rooms.with_queue(params.room_id, |state| state.add_to_queue(&caller, params.room_id)).await?;
        Ok(serde_json::to_value(BoolResult { value: true }).expect("queue join result always serializes"))
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
        self.state
            .rooms
            .with_queue(params.room_id, |state| Ok(state.remove_from_queue(&caller, params.room_id)))
            .await?;
        Ok(serde_json::to_value(BoolResult { value: true }).expect("queue leave result always serializes"))
    }
}

struct Move {
    state: AppState,
}

#[async_trait]
impl Handler for Move {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: MoveParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        if caller != params.user_id && !is_moderator(&self.state, params.room_id, &caller).await? {
            return Err(DomainError::NotAuthorized);
        }
        self.state
            .rooms
            .with_queue(params.room_id, |state| Ok(state.move_in_queue(&params.user_id, params.position, params.room_id)))
            .await?;
        Ok(serde_json::to_value(BoolResult { value: true }).expect("queue move result always serializes"))
    }
}

struct Get {
    state: AppState,
}

#[async_trait]
impl Handler for Get {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetParams = parse_params(params)?;
        let queue = self.state.rooms.read_room(params.room_id, |state| state.queue.clone()).await;
        Ok(serde_json::to_value(turntable_protocol::methods::queue::GetResult { queue }).expect("get queue result always serializes"))
    }
}

struct GetCurrentDj {
    state: AppState,
}

#[async_trait]
impl Handler for GetCurrentDj {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetCurrentDjParams = parse_params(params)?;
        let dj = self.state.rooms.read_room(params.room_id, |state| state.dj.clone()).await;
        Ok(serde_json::to_value(GetCurrentDjResult { dj }).expect("get current dj result always serializes"))
    }
}

struct GetCurrentMedia {
    state: AppState,
}

#[async_trait]
impl Handler for GetCurrentMedia {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetCurrentMediaParams = parse_params(params)?;
        let (media, started_at) = self.state.rooms.read_room(params.room_id, |state| (state.playing.clone(), state.started_at)).await;
        Ok(serde_json::to_value(GetCurrentMediaResult { media, started_at }).expect("get current media result always serializes"))
    }
}

struct Advance {
    state: AppState,
}

#[async_trait]
impl Handler for Advance {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: AdvanceParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        if !is_moderator(&self.state, params.room_id, &caller).await? {
            return Err(DomainError::NotAuthorized);
        }
        self.state.rooms.with_queue(params.room_id, |state| Ok(state.advance_queue(params.room_id))).await?;
        Ok(serde_json::to_value(BoolResult { value: true }).expect("advance queue result always serializes"))
    }
}

struct PlayMedia {
    state: AppState,
}

#[async_trait]
impl Handler for PlayMedia {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: PlayMediaParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        let media = self.state.media.resolve(&params.media_id).await?;
        self.state
            .rooms
            .with_queue(params.room_id, |state| state.play_media(&caller, media, params.room_id))
            .await?;
        Ok(serde_json::to_value(BoolResult { value: true }).expect("play media result always serializes"))
    }
}

/// §4.H SkipCurrentMedia: moderator, or the current DJ skipping their own
/// track — checked here since [`RoomRuntimeState`] doesn't know the room's
/// moderator set.
struct Skip {
    state: AppState,
}

#[async_trait]
impl Handler for Skip {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: SkipParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        let is_current_dj = self.state.rooms.read_room(params.room_id, |state| state.dj.as_ref() == Some(&caller)).await;
        if !is_current_dj && !is_moderator(&self.state, params.room_id, &caller).await? {
            return Err(DomainError::NotAuthorized);
        }
        self.state
            .rooms
            .with_queue(params.room_id, |state| state.skip_current_media(params.reason, params.room_id))
            .await?;
        Ok(serde_json::to_value(BoolResult { value: true }).expect("skip media result always serializes"))
    }
}

struct Clear {
    state: AppState,
}

#[async_trait]
impl Handler for Clear {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: ClearParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        if !is_moderator(&self.state, params.room_id, &caller).await? {
            return Err(DomainError::NotAuthorized);
        }
        self.state.rooms.with_queue(params.room_id, |state| Ok(state.clear(params.room_id))).await?;
        Ok(serde_json::to_value(BoolResult { value: true }).expect("clear queue result always serializes"))
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
        if !is_moderator(&self.state, params.room_id, &caller).await? {
            return Err(DomainError::NotAuthorized);
        }
        self.state.rooms.with_queue(params.room_id, |state| Ok(state.shuffle(params.room_id))).await?;
        Ok(serde_json::to_value(BoolResult { value: true }).expect("shuffle queue result always serializes"))
    }
}

struct GetPosition {
    state: AppState,
}

#[async_trait]
impl Handler for GetPosition {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetPositionParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        let position = self.state.rooms.read_room(params.room_id, |state| state.position_of(&caller)).await;
        Ok(serde_json::to_value(GetPositionResult { position }).expect("get position result always serializes"))
    }
}

struct IsInQueue {
    state: AppState,
}

#[async_trait]
impl Handler for IsInQueue {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: IsInQueueParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        let value = self.state.rooms.read_room(params.room_id, |state| state.position_of(&caller).is_some()).await;
        Ok(serde_json::to_value(BoolResult { value }).expect("is in queue result always serializes"))
    }
}

struct IsCurrentDj {
    state: AppState,
}

#[async_trait]
impl Handler for IsCurrentDj {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: IsCurrentDjParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        let value = self.state.rooms.read_room(params.room_id, |state| state.dj.as_ref() == Some(&caller)).await;
        Ok(serde_json::to_value(BoolResult { value }).expect("is current dj result always serializes"))
    }
}

struct GetHistory {
    state: AppState,
}

#[async_trait]
impl Handler for GetHistory {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetHistoryParams = parse_params(params)?;
        let history = self.state.rooms.read_room(params.room_id, |state| state.recent_history(params.limit)).await;
        Ok(serde_json::to_value(GetHistoryResult { history }).expect("get history result always serializes"))
    }
}

struct Vote {
    state: AppState,
}

#[async_trait]
impl Handler for Vote {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: VoteParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        self.state
            .rooms
            .with_queue(params.room_id, |state| state.vote(&caller, params.kind, params.room_id))
            .await?;
        Ok(serde_json::to_value(BoolResult { value: true }).expect("vote result always serializes"))
    }
}

pub(crate) async fn register(state: &AppState) {
    super::register(&state.router, "queue.join", true, Arc::new(Join { state: state.clone() })).await;
    super::register(&state.router, "queue.leave", true, Arc::new(Leave { state: state.clone() })).await;
    super::register(&state.router, "queue.move", true, Arc::new(Move { state: state.clone() })).await;
    super::register(&state.router, "queue.get", true, Arc::new(Get { state: state.clone() })).await;
    super::register(&state.router, "queue.getCurrentDJ", true, Arc::new(GetCurrentDj { state: state.clone() })).await;
    super::register(&state.router, "queue.getCurrentMedia", true, Arc::new(GetCurrentMedia { state: state.clone() })).await;
    super::register(&state.router, "queue.advance", true, Arc::new(Advance { state: state.clone() })).await;
    super::register(&state.router, "queue.playMedia", true, Arc::new(PlayMedia { state: state.clone() })).await;
    super::register(&state.router, "queue.skip", true, Arc::new(Skip { state: state.clone() })).await;
    super::register(&state.router, "queue.clear", true, Arc::new(Clear { state: state.clone() })).await;
    super::register(&state.router, "queue.shuffle", true, Arc::new(Shuffle { state: state.clone() })).await;
    super::register(&state.router, "queue.getPosition", true, Arc::new(GetPosition { state: state.clone() })).await;
    super::register(&state.router, "queue.isInQueue", true, Arc::new(IsInQueue { state: state.clone() })).await;
    super::register(&state.router, "queue.isCurrentDj", true, Arc::new(IsCurrentDj { state: state.clone() })).await;
    super::register(&state.router, "queue.getHistory", true, Arc::new(GetHistory { state: state.clone() })).await;
    super::register(&state.router, "queue.vote", true, Arc::new(Vote { state: state.clone() })).await;
}
