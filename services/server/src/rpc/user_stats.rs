//! `user.*` stats/discovery methods: per-user stats, leaderboards, rank,
//! experience progress, presence, search.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use turntable_core::context::RequestContext;
use turntable_core::error::DomainError;
use turntable_core::repository::UserRecord;
use turntable_core::router::Handler;
use turntable_core::Client;
use turntable_protocol::methods::session::UserProfile;
use turntable_protocol::methods::user::{
    GetExperienceProgressParams, GetExperienceProgressResult, GetOnlineUsersResult, GetRankParams, GetRankResult, GetStatsParams, GetStatsResult, GetTopUsersParams, GetTopUsersResult,
    SearchUsersParams, SearchUsersResult, UserStats,
};

use crate::state::AppState;

use super::parse_params;

/// This deployment tracks experience but not the finer-grained play
/// counters (songs played, woots/mehs received, time in rooms) a real
/// stats pipeline would accumulate from room history — those fields
/// report zero until something populates them.
fn stats_of(record: &UserRecord) -> UserStats {
    UserStats {
        user_id: record.id.clone(),
        songs_played: 0,
        woots_received: 0,
        mehs_received: 0,
        time_in_rooms_secs: 0,
    }
}

fn profile_of(record: &UserRecord) -> UserProfile {
    UserProfile {
        user_id: record.id.clone(),
        username: record.username.clone(),
        avatar_url: record.avatar_url.clone(),
        roles: Vec::new(),
        level: super::level_for_experience(record.experience),
        experience: record.experience,
    }
}

struct GetStats {
    state: AppState,
}

#[async_trait]
impl Handler for GetStats {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetStatsParams = parse_params(params)?;
        let record = self.state.users.get(&params.user_id).await?;
        Ok(serde_json::to_value(stats_of(&record) as GetStatsResult).expect("get stats result always serializes"))
    }
}

struct GetTopUsers {
    state: AppState,
}

#[async_trait]
impl Handler for GetTopUsers {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetTopUsersParams = parse_params(params)?;
        let records = self.state.users.top_by_experience(params.limit).await?;
        Ok(serde_json::to_value(GetTopUsersResult {
            users: records.iter().map(stats_of).collect(),
        })
        .expect("get top users result always serializes"))
    }
}

struct GetRank {
    state: AppState,
}

#[async_trait]
impl Handler for GetRank {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetRankParams = parse_params(params)?;
        let rank = self.state.users.rank_of(&params.user_id).await?;
        Ok(serde_json::to_value(GetRankResult { rank }).expect("get rank result always serializes"))
    }
}

struct GetExperienceProgress {
    state: AppState,
}

#[async_trait]
impl Handler for GetExperienceProgress {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetExperienceProgressParams = parse_params(params)?;
        let record = self.state.users.get(&params.user_id).await?;
        Ok(serde_json::to_value(GetExperienceProgressResult {
            level: super::level_for_experience(record.experience),
            experience: record.experience,
            experience_for_next_level: super::experience_for_next_level(record.experience),
        })
        .expect("get experience progress result always serializes"))
    }
}

struct GetOnlineUsers {
    state: AppState,
}

#[async_trait]
impl Handler for GetOnlineUsers {
    async fn call(&self, _ctx: RequestContext, _client: Client, _params: Option<Value>) -> Result<Value, DomainError> {
        let users = self.state.presence.online_users().await?;
        Ok(serde_json::to_value(GetOnlineUsersResult { users }).expect("get online users result always serializes"))
    }
}

struct SearchUsers {
    state: AppState,
}

#[async_trait]
impl Handler for SearchUsers {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: SearchUsersParams = parse_params(params)?;
        let needle = params.query.to_lowercase();
        let mut matches = Vec::new();
        for user_id in self.state.presence.online_users().await? {
            if let Ok(record) = self.state.users.get(&user_id).await {
                if record.username.to_lowercase().contains(&needle) {
                    matches.push(profile_of(&record));
                }
            }
        }
        matches.truncate(params.limit as usize);
        Ok(serde_json::to_value(SearchUsersResult { users: matches }).expect("search users result always serializes"))
    }
}

pub(crate) async fn register(state: &AppState) {
    super::register(&state.router, "user.getStats", true, Arc::new(GetStats { state: state.clone() })).await;
    super::register(&state.router, "user.getTopUsers", true, Arc::new(GetTopUsers { state: state.clone() })).await;
    super::register(&state.router, "user.getRank", true, Arc::new(GetRank { state: state.clone() })).await;
    super::register(&state.router, "user.getExperienceProgress", true, Arc::new(GetExperienceProgress { state: state.clone() })).await;
    super::register(&state.router, "user.getOnlineUsers", true, Arc::new(GetOnlineUsers { state: state.clone() })).await;
    super::register(&state.router, "user.searchUsers", true, Arc::new(SearchUsers { state: state.clone() })).await;
}
