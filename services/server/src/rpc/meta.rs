//! `ping`: the one method every client can call before authenticating,
//! used by integration tests and load balancers alike as a liveness probe.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use turntable_core::context::RequestContext;
use turntable_core::error::DomainError;
use turntable_core::router::Handler;
use turntable_core::Client;
use turntable_protocol::methods::meta::PingResult;

use crate::state::AppState;

struct Ping;

#[async_trait]
impl Handler for Ping {
    async fn call(&self, _ctx: RequestContext, _client: Client, _params: Option<Value>) -> Result<Value, DomainError> {
        Ok(serde_json::to_value(PingResult::default()).expect("ping result always serializes"))
    }
}

pub(crate) async fn register(state: &AppState) {
    super::register(&state.router, "ping", false, Arc::new(Ping)).await;
}
