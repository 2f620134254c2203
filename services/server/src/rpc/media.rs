//! `media.*` methods: thin wrappers over the [`turntable_core::media::MediaResolver`]
//! capability — the RPC surface validates and shapes, the resolver does
//! the actual catalog work.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use turntable_core::context::RequestContext;
use turntable_core::error::DomainError;
use turntable_core::router::Handler;
use turntable_core::Client;
use turntable_protocol::methods::media::{GetInfoParams, GetInfoResult, GetStreamUrlParams, GetStreamUrlResult, SearchParams, SearchResult};

use crate::state::AppState;

use super::parse_params;

/// The in-memory resolver's URLs don't actually expire; this is the value
/// reported to clients that plan around a refresh cadence.
const STREAM_URL_TTL_SECS: u32 = 3600;

struct Search {
    state: AppState,
}

#[async_trait]
impl Handler for Search {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: SearchParams = parse_params(params)?;
        let results = self.state.media.search(&params.query, params.limit).await?;
        Ok(serde_json::to_value(SearchResult { results }).expect("media search result always serializes"))
    }
}

struct GetInfo {
    state: AppState,
}

#[async_trait]
impl Handler for GetInfo {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetInfoParams = parse_params(params)?;
        let info = self.state.media.resolve(&params.media_id).await?;
        Ok(serde_json::to_value(info as GetInfoResult).expect("get media info result always serializes"))
    }
}

struct GetStreamUrl {
    state: AppState,
}

#[async_trait]
impl Handler for GetStreamUrl {
    async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetStreamUrlParams = parse_params(params)?;
        let url = self.state.media.stream_url(&params.media_id).await?;
        Ok(serde_json::to_value(GetStreamUrlResult {
            url,
            expires_in_secs: STREAM_URL_TTL_SECS,
        })
        .expect("get stream url result always serializes"))
    }
}

pub(crate) async fn register(state: &AppState) {
    super::register(&state.router, "media.search", true, Arc::new(Search { state: state.clone() })).await;
    super::register(&state.router, "media.getInfo", true, Arc::new(GetInfo { state: state.clone() })).await;
    super::register(&state.router, "media.getStreamURL", true, Arc::new(GetStreamUrl { state: state.clone() })).await;
}
