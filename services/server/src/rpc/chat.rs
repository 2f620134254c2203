//! `chat.*` methods: room-scoped chat send/read/delete over the same
//! runtime state the queue lives on.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use turntable_core::context::RequestContext;
use turntable_core::error::DomainError;
use turntable_core::room::state::RoomRuntimeState;
use turntable_core::router::Handler;
use turntable_core::Client;
use turntable_protocol::methods::chat::{DeleteMessageParams, DeleteMessageResult, GetMessagesParams, GetMessagesResult, SendMessageParams};

use crate::state::AppState;

use super::parse_params;

fn caller_of(ctx: &RequestContext) -> Result<turntable_protocol::UserId, DomainError> {
    ctx.claims().user_id.clone().ok_or(DomainError::AuthenticationRequired)
}

struct SendMessage {
    state: AppState,
}

#[async_trait]
impl Handler for SendMessage {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: SendMessageParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        self.state
            .rooms
            .with_queue(params.room_id, |state| Ok(state.send_chat_message(&caller, params.text, params.room_id)))
            .await?;
        let sent = self
            .state
            .rooms
            .read_room(params.room_id, |state| state.recent_chat(1).into_iter().next())
            .await
            .ok_or_else(|| DomainError::Internal("chat message vanished immediately after send".to_owned()))?;
        Ok(serde_json::to_value(sent).expect("send message result always serializes"))
    }
}

struct GetMessages {
    state: AppState,
}

#[async_trait]
impl Handler for GetMessages {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetMessagesParams = parse_params(params)?;
        let messages = self.state.rooms.read_room(params.room_id, |state| state.recent_chat(params.limit)).await;
        Ok(serde_json::to_value(GetMessagesResult { messages }).expect("get messages result always serializes"))
    }
}

/// Only the sender or a room moderator may delete a message —
/// [`RoomRuntimeState::delete_chat_message`] doesn't know the room's
/// moderator set, so the check lives here.
struct DeleteMessage {
    state: AppState,
}

#[async_trait]
impl Handler for DeleteMessage {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: DeleteMessageParams = parse_params(params)?;
        let caller = caller_of(&ctx)?;
        let sender = self.state.rooms.read_room(params.room_id, |state| state.chat.iter().find(|m| m.message_id == params.message_id).map(|m| m.user_id.clone())).await;
        let room = self.state.rooms.get(&params.room_id).await?;
        let moderator_ids: Vec<_> = room.moderator_ids.into_iter().collect();
        let permitted = sender.as_ref() == Some(&caller) || RoomRuntimeState::is_moderator(&moderator_ids, &caller);
        if !permitted {
            return Err(DomainError::NotAuthorized);
        }
        self.state
            .rooms
            .with_queue(params.room_id, |state| Ok(state.delete_chat_message(&params.message_id, params.room_id)))
            .await?;
        Ok(serde_json::to_value(DeleteMessageResult { deleted: true }).expect("delete message result always serializes"))
    }
}

pub(crate) async fn register(state: &AppState) {
    super::register(&state.router, "chat.sendMessage", true, Arc::new(SendMessage { state: state.clone() })).await;
    super::register(&state.router, "chat.getMessages", true, Arc::new(GetMessages { state: state.clone() })).await;
    super::register(&state.router, "chat.deleteMessage", true, Arc::new(DeleteMessage { state: state.clone() })).await;
}
