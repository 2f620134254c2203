//! Server-pushed notification payloads.
//!
//! The source material gives several notification `params` an untyped "any"
//! shape. We replace that with one tagged-union variant per notification
//! method (Design Notes, "ambient `any` payloads") so the emit site in the
//! hub and the client share a schema instead of agreeing on it by
//! convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MediaId, RoomId, UserId};
use crate::methods::queue::VoteTallies;
use crate::methods::room::RoomSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub media_id: MediaId,
    pub title: String,
    pub artist: String,
    pub duration_secs: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteKind {
    Woot,
    Meh,
    Grab,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageInfo {
    pub message_id: String,
    pub user_id: UserId,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateSnapshot {
    pub dj: Option<UserId>,
    pub playing: Option<MediaInfo>,
    pub queue: Vec<UserId>,
    pub audience_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum Notification {
    #[serde(rename = "user:room_join")]
    UserRoomJoin { room_id: RoomId, user_id: UserId },

    #[serde(rename = "user:room_leave")]
    UserRoomLeave { room_id: RoomId, user_id: UserId },

    #[serde(rename = "room:state_changed")]
    RoomStateChanged {
        room_id: RoomId,
        state: RoomStateSnapshot,
    },

    #[serde(rename = "room:updated")]
    RoomUpdated { room: RoomSummary },

    #[serde(rename = "queue:updated")]
    QueueUpdated {
        room_id: RoomId,
        dj: Option<UserId>,
        queue: Vec<UserId>,
    },

    #[serde(rename = "track:start")]
    TrackStart {
        room_id: RoomId,
        dj: UserId,
        media: MediaInfo,
        started_at: DateTime<Utc>,
    },

    #[serde(rename = "track:end")]
    TrackEnd { room_id: RoomId, media_id: MediaId },

    #[serde(rename = "track:skip")]
    TrackSkip { room_id: RoomId, reason: String },

    #[serde(rename = "track:vote")]
    TrackVote {
        room_id: RoomId,
        user_id: UserId,
        kind: VoteKind,
        tallies: VoteTallies,
    },

    #[serde(rename = "chat:message")]
    ChatMessage {
        room_id: RoomId,
        message: ChatMessageInfo,
    },

    #[serde(rename = "chat:message_delete")]
    ChatMessageDelete { room_id: RoomId, message_id: String },
}

impl Notification {
    #[must_use]
    pub fn method_name(&self) -> &'static str {
        match self {
            Notification::UserRoomJoin { .. } => "user:room_join",
            Notification::UserRoomLeave { .. } => "user:room_leave",
            Notification::RoomStateChanged { .. } => "room:state_changed",
            Notification::RoomUpdated { .. } => "room:updated",
            Notification::QueueUpdated { .. } => "queue:updated",
            Notification::TrackStart { .. } => "track:start",
            Notification::TrackEnd { .. } => "track:end",
            Notification::TrackSkip { .. } => "track:skip",
            Notification::TrackVote { .. } => "track:vote",
            Notification::ChatMessage { .. } => "chat:message",
            Notification::ChatMessageDelete { .. } => "chat:message_delete",
        }
    }
}

/// A notification on the wire: a JSON-RPC frame with no `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationFrame {
    pub jsonrpc: String,
    #[serde(flatten)]
    pub payload: Notification,
}

impl NotificationFrame {
    #[must_use]
    pub fn new(payload: Notification) -> Self {
        Self {
            jsonrpc: crate::envelope::JSONRPC_VERSION.to_owned(),
            payload,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_matches_method_and_params_fields() {
        let frame = NotificationFrame::new(Notification::UserRoomJoin {
            room_id: "000000000000000000000000".parse().unwrap(),
            user_id: UserId::from("U1"),
        });
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["method"], "user:room_join");
        assert_eq!(value["params"]["userId"], "U1");
        assert!(value.get("id").is_none());
    }
}
