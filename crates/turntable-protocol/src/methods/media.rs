//! `media.*` RPC parameter and result types.
//!
//! Thin wrappers over the `MediaResolver` capability (§1 non-goals):
//! handlers validate and shape, the resolver does the actual catalog work.

use serde::{Deserialize, Serialize};

use crate::ids::MediaId;
use crate::notification::MediaInfo;

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
    pub results: Vec<MediaInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetInfoParams {
    pub media_id: MediaId,
}

pub type GetInfoResult = MediaInfo;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStreamUrlParams {
    pub media_id: MediaId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStreamUrlResult {
    pub url: String,
    pub expires_in_secs: u32,
}
