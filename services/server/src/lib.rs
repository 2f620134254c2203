pub mod memory;
pub mod rpc;
pub mod rpc_http;
pub mod state;
pub mod ws;

pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Mounts the `/ws` upgrade route, the `/rpc` HTTP JSON-RPC batch
/// endpoint, and the two liveness probes every deployment target expects.
/// Every RPC method is reachable over either transport; `/ws` is the only
/// one that also receives server-pushed notifications.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/rpc", post(rpc_http::rpc_handler))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

mod health {
    use axum::response::IntoResponse;
    pub async fn healthz() -> impl IntoResponse {
        "ok"
    }
    pub async fn readyz() -> impl IntoResponse {
        "ok"
    }
}
