//! `playlist.*` RPC parameter and result types.

use serde::{Deserialize, Serialize};

use crate::ids::{MediaId, PlaylistId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub media_id: MediaId,
    pub title: String,
    pub artist: String,
    pub duration_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    pub id: PlaylistId,
    pub owner_id: UserId,
    pub name: String,
    pub items: Vec<PlaylistItem>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParams {
    pub name: String,
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
}

pub type CreateResult = PlaylistSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetParams {
    pub playlist_id: PlaylistId,
}

pub type GetResult = PlaylistSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUserPlaylistsResult {
    pub playlists: Vec<PlaylistSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParams {
    pub playlist_id: PlaylistId,
    #[serde(default)]
    pub name: Option<String>,
}

pub type UpdateResult = PlaylistSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteParams {
    pub playlist_id: PlaylistId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResult {
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemParams {
    pub playlist_id: PlaylistId,
    pub item: PlaylistItem,
}

pub type AddItemResult = PlaylistSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemParams {
    pub playlist_id: PlaylistId,
    pub media_id: MediaId,
}

pub type RemoveItemResult = PlaylistSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportParams {
    pub playlist_id: PlaylistId,
    pub source_url: String,
}

pub type ImportResult = PlaylistSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveParams {
    pub playlist_id: PlaylistId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetActiveResult {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetActiveResult {
    pub playlist: Option<PlaylistSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShuffleParams {
    pub playlist_id: PlaylistId,
}

pub type ShuffleResult = PlaylistSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub playlists: Vec<PlaylistSummary>,
}
