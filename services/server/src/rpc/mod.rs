//! The RPC method table: one [`turntable_core::Handler`] per method,
//! wired into a [`turntable_core::Router`] with the Recovery/Logging/Auth
//! middleware stack applied per method.
//!
//! Grounded on `build_router` in the module this file replaces: a single
//! function enumerating every route, here registering RPC methods
//! instead of mounting HTTP handlers.

mod chat;
mod media;
mod meta;
mod playlist;
mod queue;
mod room;
mod session;
mod user_stats;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use turntable_core::error::DomainError;
use turntable_core::router::{Auth, HandlerRef, Logging, Recovery};
use turntable_core::Router;

use crate::state::AppState;

/// Deserializes a handler's `params`, mapping a missing or malformed
/// payload onto the same `InvalidParams` the domain layer uses for
/// business-rule validation failures.
pub(crate) fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, DomainError> {
    let value = params.unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| DomainError::InvalidParams(e.to_string()))
}

/// Registers `handler` under `method`, wrapping it with Recovery and
/// Logging unconditionally and Auth when the method requires a
/// authenticated caller (every method except `ping`, `user.login`, and
/// `user.register` per §4.E).
async fn register(base: &Router, method: &'static str, requires_auth: bool, handler: HandlerRef) {
    let mut view = base.clone().wrap(Arc::new(Recovery)).wrap(Arc::new(Logging { method }));
    if requires_auth {
        view = view.wrap(Arc::new(Auth));
    }
    view.register(method, handler).await;
}

pub fn build_router() -> Router {
    Router::new()
}

/// Experience tiers: a level's worth of experience is a flat 1000 points.
/// Not specified numerically by the protocol; simple enough that
/// `user.getExperienceProgress` has an obvious, checkable answer.
pub(crate) const EXPERIENCE_PER_LEVEL: u64 = 1000;

pub(crate) fn level_for_experience(experience: u64) -> u32 {
    1 + (experience / EXPERIENCE_PER_LEVEL) as u32
}

pub(crate) fn experience_for_next_level(experience: u64) -> u64 {
    u64::from(level_for_experience(experience)) * EXPERIENCE_PER_LEVEL
}

/// Registers every handler onto `state.router` against `state`'s
/// capability trait objects. Split from [`build_router`] because handlers
/// close over `AppState`, which doesn't exist until [`AppState::new`] has
/// already constructed the (empty) router.
pub async fn register_all(state: &AppState) {
    session::register(state).await;
    user_stats::register(state).await;
    room::register(state).await;
    queue::register(state).await;
    chat::register(state).await;
    media::register(state).await;
    playlist::register(state).await;
    meta::register(state).await;
}
