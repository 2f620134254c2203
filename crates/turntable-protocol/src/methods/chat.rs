//! `chat.*` RPC parameter and result types.

use serde::{Deserialize, Serialize};

use crate::ids::RoomId;
use crate::notification::ChatMessageInfo;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageParams {
    pub room_id: RoomId,
    pub text: String,
}

pub type SendMessageResult = ChatMessageInfo;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMessagesParams {
    pub room_id: RoomId,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMessagesResult {
    pub messages: Vec<ChatMessageInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessageParams {
    pub room_id: RoomId,
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteMessageResult {
    pub deleted: bool,
}
