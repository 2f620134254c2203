//! `user.*` stats/discovery RPC parameter and result types.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;
use crate::methods::session::UserProfile;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStatsParams {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub user_id: UserId,
    pub songs_played: u64,
    pub woots_received: u64,
    pub mehs_received: u64,
    pub time_in_rooms_secs: u64,
}

pub type GetStatsResult = UserStats;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTopUsersParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTopUsersResult {
    pub users: Vec<UserStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRankParams {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRankResult {
    pub rank: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetExperienceProgressParams {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetExperienceProgressResult {
    pub level: u32,
    pub experience: u64,
    pub experience_for_next_level: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetOnlineUsersResult {
    pub users: Vec<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchUsersParams {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchUsersResult {
    pub users: Vec<UserProfile>,
}
