//! `POST /rpc`: the HTTP JSON-RPC transport (§4.A "the realtime transport
//! is single-request-per-frame" implies a second transport for batches).
//!
//! Grounded on `http/response.rs`'s `json_error` helper, applied to the
//! JSON-RPC error envelope instead of a bespoke HTTP one — a malformed
//! body still gets a JSON-RPC `ParseError`/`InvalidRequest` response, not
//! a raw HTTP 400.
//!
//! A single object and a batch array share one entry point, exactly as
//! the JSON-RPC 2.0 spec requires: `[Request]` dispatches every element
//! independently and returns the responses in an array (notifications
//! omitted; an all-notification batch returns an empty body), a bare
//! `Request` returns a bare `Response`.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use turntable_core::context::Claims;
use turntable_core::{Client, RequestContext};
use turntable_protocol::envelope::{error_codes, parse_request};
use turntable_protocol::{ClientId, Response, RpcError};

use crate::state::{AppState, REQUEST_TIMEOUT};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Batch {
    Single(Value),
    Many(Vec<Value>),
}

pub async fn rpc_handler(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    let claims = match authenticate(&state, &headers).await {
        Ok(claims) => claims,
        Err(response) => return (StatusCode::OK, Json(serde_json::to_value(response).expect("response always serializes"))).into_response(),
    };

    let batch: Batch = match serde_json::from_value(body) {
        Ok(batch) => batch,
        Err(_) => {
            let error = Response::failure(None, RpcError::new(error_codes::INVALID_REQUEST, "body must be a JSON-RPC request or an array of requests"));
            return (StatusCode::OK, Json(serde_json::to_value(error).expect("response always serializes"))).into_response();
        }
    };

    match batch {
        Batch::Single(raw) => match handle_one(&state, &claims, &raw).await {
            Some(response) => (StatusCode::OK, Json(serde_json::to_value(response).expect("response always serializes"))).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        },
        Batch::Many(entries) => {
            if entries.is_empty() {
                let error = Response::failure(None, RpcError::new(error_codes::INVALID_REQUEST, "batch must not be empty"));
                return (StatusCode::OK, Json(serde_json::to_value(error).expect("response always serializes"))).into_response();
            }
            let mut responses = Vec::with_capacity(entries.len());
            for raw in &entries {
                if let Some(response) = handle_one(&state, &claims, raw).await {
                    responses.push(response);
                }
            }
            if responses.is_empty() {
                StatusCode::NO_CONTENT.into_response()
            } else {
                (StatusCode::OK, Json(responses)).into_response()
            }
        }
    }
}

/// Resolves an optional `Authorization: Bearer <token>` header the same
/// way the WebSocket handshake does (§4.D); an absent header leaves the
/// caller unauthenticated rather than rejecting the request outright, so
/// `user.login`/`user.register` remain reachable over this transport too.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Claims, Response> {
    let Some(token) = bearer_token(headers) else {
        return Ok(Claims::default());
    };
    match state.auth.authenticate_token(token).await {
        Ok(claims) => Ok(claims),
        Err(_) => Err(Response::failure(
            None,
            RpcError::new(error_codes::INVALID_TOKEN, "invalid or expired token"),
        )),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

/// Parses and dispatches one JSON-RPC request through the same router the
/// WebSocket transport uses, via a throwaway `Client` with no socket
/// behind it — fine, since HTTP handlers never need to push a message
/// back through `Client::send_text`; their reply is the HTTP response
/// itself.
async fn handle_one(state: &AppState, claims: &Claims, raw: &Value) -> Option<Response> {
    let request = match parse_request(&raw.to_string()) {
        Ok(request) => request,
        Err(error) => return Some(Response::failure(None, RpcError::new(error.code(), error.to_string()))),
    };
    let (client, _outbound_rx) = Client::new(ClientId::generate());
    if let Some(user_id) = &claims.user_id {
        client.set_user_id(Some(user_id.clone())).await;
    }
    let ctx = RequestContext::new(client.id(), claims.clone(), REQUEST_TIMEOUT, state.shutdown.clone());
    state.router.handle_request(request, ctx, client).await
}
