//! `queue.*` RPC parameter and result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MediaId, RoomId, UserId};
use crate::notification::MediaInfo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteTallies {
    pub woots: u32,
    pub mehs: u32,
    pub grabs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayHistorySummary {
    pub media_id: MediaId,
    pub title: String,
    pub artist: String,
    pub duration_secs: u32,
    pub started_at: DateTime<Utc>,
    pub final_tallies: VoteTallies,
    pub skipped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomScopedParams {
    pub room_id: RoomId,
}

pub type JoinParams = RoomScopedParams;
pub type LeaveParams = RoomScopedParams;
pub type GetParams = RoomScopedParams;
pub type GetCurrentDjParams = RoomScopedParams;
pub type GetCurrentMediaParams = RoomScopedParams;
pub type AdvanceParams = RoomScopedParams;
pub type ClearParams = RoomScopedParams;
pub type ShuffleParams = RoomScopedParams;
pub type IsInQueueParams = RoomScopedParams;
pub type IsCurrentDjParams = RoomScopedParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetResult {
    pub queue: Vec<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCurrentDjResult {
    pub dj: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCurrentMediaResult {
    pub media: Option<MediaInfo>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveParams {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub position: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayMediaParams {
    pub room_id: RoomId,
    pub media_id: MediaId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipParams {
    pub room_id: RoomId,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteParams {
    pub room_id: RoomId,
    pub kind: crate::notification::VoteKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPositionParams {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPositionResult {
    pub position: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoolResult {
    pub value: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetHistoryParams {
    pub room_id: RoomId,
    #[serde(default = "default_history_limit")]
    pub limit: u32,
}

fn default_history_limit() -> u32 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetHistoryResult {
    pub history: Vec<PlayHistorySummary>,
}
