//! RPC router (§4.E): a method table plus an outside-in middleware chain.
//!
//! Composing a `Handler -> Handler` chain via a small `Middleware` trait
//! is the same "wrapper implements the trait it wraps" pattern
//! `rt-ui-log`'s `UiLogger` uses for its buffered sink, generalized from
//! one fixed wrapper to an arbitrary stack registered at startup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{error, info};

use turntable_protocol::{error_codes, Request, Response, RpcError};

use crate::client::Client;
use crate::context::RequestContext;
use crate::error::DomainError;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: RequestContext, client: Client, params: Option<Value>) -> Result<Value, DomainError>;
}

pub type HandlerRef = Arc<dyn Handler>;

/// `Handler -> Handler`, applied at registration time (§4.E "middleware
/// composes outside-in — the first wrap is outermost").
pub trait Middleware: Send + Sync {
    fn wrap(&self, inner: HandlerRef) -> HandlerRef;
}

/// Catches a panicking handler and converts it to `DomainError::Internal`
/// instead of taking down the connection's read pump. Implemented by
/// running the handler on its own task: a panic there surfaces as a
/// `JoinError`, which we can inspect without `catch_unwind` across an
/// await point.
pub struct Recovery;

struct RecoveryHandler {
    inner: HandlerRef,
}

#[async_trait]
impl Handler for RecoveryHandler {
    async fn call(&self, ctx: RequestContext, client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.call(ctx, client, params).await });
        match task.await {
            Ok(result) => result,
            Err(join_err) => {
                error!(error = %join_err, "rpc handler panicked");
                Err(DomainError::Internal("handler panicked".to_owned()))
            }
        }
    }
}

impl Middleware for Recovery {
    fn wrap(&self, inner: HandlerRef) -> HandlerRef {
        Arc::new(RecoveryHandler { inner })
    }
}

/// Structured log line per call: method is attached by the caller via
/// `tracing`'s span, since the handler itself doesn't know its own
/// registered name.
pub struct Logging {
    pub method: &'static str,
}

struct LoggingHandler {
    method: &'static str,
    inner: HandlerRef,
}

#[async_trait]
impl Handler for LoggingHandler {
    async fn call(&self, ctx: RequestContext, client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let started = Instant::now();
        let client_id = ctx.client_id();
        let user_id = ctx.claims().user_id.clone();
        let result = self.inner.call(ctx, client, params).await;
        info!(
            method = self.method,
            client_id = %client_id,
            user_id = ?user_id,
            latency_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "rpc call"
        );
        result
    }
}

impl Middleware for Logging {
    fn wrap(&self, inner: HandlerRef) -> HandlerRef {
        Arc::new(LoggingHandler {
            method: self.method,
            inner,
        })
    }
}

/// §4.E Auth: rejects with `AuthenticationRequired` if the caller's
/// claims carry no user id.
pub struct Auth;

struct AuthHandler {
    inner: HandlerRef,
}

#[async_trait]
impl Handler for AuthHandler {
    async fn call(&self, ctx: RequestContext, client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        if !ctx.claims().is_authenticated() {
            return Err(DomainError::AuthenticationRequired);
        }
        self.inner.call(ctx, client, params).await
    }
}

impl Middleware for Auth {
    fn wrap(&self, inner: HandlerRef) -> HandlerRef {
        Arc::new(AuthHandler { inner })
    }
}

/// §4.E Role(r): rejects with `NotAuthorized` unless the caller's roles
/// include `r`.
pub struct Role(pub String);

struct RoleHandler {
    role: String,
    inner: HandlerRef,
}

#[async_trait]
impl Handler for RoleHandler {
    async fn call(&self, ctx: RequestContext, client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        if !ctx.claims().has_role(&self.role) {
            return Err(DomainError::NotAuthorized);
        }
        self.inner.call(ctx, client, params).await
    }
}

impl Middleware for Role {
    fn wrap(&self, inner: HandlerRef) -> HandlerRef {
        Arc::new(RoleHandler {
            role: self.0.clone(),
            inner,
        })
    }
}

/// Method table plus the middleware stack applied to every registration
/// made through this view. `wrap` consumes and returns `Self` so call
/// sites read as a builder: `router.wrap(Recovery).wrap(Logging)`.
#[derive(Clone)]
pub struct Router {
    handlers: Arc<RwLock<HashMap<&'static str, HandlerRef>>>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            middlewares: Vec::new(),
        }
    }

    #[must_use]
    pub fn wrap(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub async fn register(&self, method: &'static str, handler: HandlerRef) {
        let wrapped = self.middlewares.iter().rev().fold(handler, |acc, mw| mw.wrap(acc));
        self.handlers.write().await.insert(method, wrapped);
    }

    async fn dispatch(&self, method: &str, ctx: RequestContext, client: Client, params: Option<Value>) -> Result<Value, RpcError> {
        let handler = self.handlers.read().await.get(method).cloned();
        let Some(handler) = handler else {
            return Err(RpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("unknown method: {method}"),
            ));
        };
        handler.call(ctx, client, params).await.map_err(|e| e.to_rpc_error())
    }

    /// Dispatches a parsed request and shapes the JSON-RPC response. A
    /// notification (absent `id`) never produces a response, regardless
    /// of the handler's outcome (§4.E).
    pub async fn handle_request(&self, request: Request, ctx: RequestContext, client: Client) -> Option<Response> {
        let is_notification = request.is_notification();
        let id = request.id.flatten();
        let result = self.dispatch(&request.method, ctx, client, request.params).await;
        if is_notification {
            return None;
        }
        Some(match result {
            Ok(value) => Response::success(id, value),
            Err(err) => Response::failure(id, err),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Claims;
    use turntable_protocol::ClientId;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn call(&self, _ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
            Ok(params.unwrap_or(Value::Null))
        }
    }

    struct AlwaysPanics;

    #[async_trait]
    impl Handler for AlwaysPanics {
        async fn call(&self, _ctx: RequestContext, _client: Client, _params: Option<Value>) -> Result<Value, DomainError> {
            panic!("boom");
        }
    }

    fn ctx(claims: Claims) -> (RequestContext, Client) {
        let (client, _rx) = Client::new(ClientId::generate());
        let ctx = RequestContext::new(
            client.id(),
            claims,
            std::time::Duration::from_secs(5),
            crate::context::CancellationToken::new(),
        );
        (ctx, client)
    }

    #[tokio::test]
    async fn unregistered_method_is_method_not_found() {
        let router = Router::new();
        let (ctx, client) = ctx(Claims::default());
        let err = router.dispatch("nope", ctx, client, None).await.unwrap_err();
        assert_eq!(err.code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn auth_middleware_rejects_unauthenticated_callers() {
        let router = Router::new().wrap(Arc::new(Auth));
        router.register("ping", Arc::new(Echo)).await;
        let (ctx, client) = ctx(Claims::default());
        let err = router.dispatch("ping", ctx, client, None).await.unwrap_err();
        assert_eq!(err.code, error_codes::AUTHENTICATION_REQUIRED);
    }

    #[tokio::test]
    async fn role_middleware_rejects_callers_missing_the_role() {
        let router = Router::new().wrap(Arc::new(Role("moderator".to_owned())));
        router.register("room.delete", Arc::new(Echo)).await;
        let claims = Claims {
            user_id: Some(turntable_protocol::UserId::from("u1")),
            ..Claims::default()
        };
        let (ctx, client) = ctx(claims);
        let err = router.dispatch("room.delete", ctx, client, None).await.unwrap_err();
        assert_eq!(err.code, error_codes::NOT_AUTHORIZED);
    }

    #[tokio::test]
    async fn recovery_converts_a_panic_into_an_internal_error() {
        let router = Router::new().wrap(Arc::new(Recovery));
        router.register("boom", Arc::new(AlwaysPanics)).await;
        let (ctx, client) = ctx(Claims::default());
        let err = router.dispatch("boom", ctx, client, None).await.unwrap_err();
        assert_eq!(err.code, error_codes::INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn notifications_never_produce_a_response() {
        let router = Router::new();
        router.register("ping", Arc::new(Echo)).await;
        let (ctx, client) = ctx(Claims::default());
        let request = Request {
            jsonrpc: "2.0".to_owned(),
            method: "ping".to_owned(),
            params: None,
            id: None,
        };
        assert!(router.handle_request(request, ctx, client).await.is_none());
    }

    #[tokio::test]
    async fn middleware_order_applies_outermost_first() {
        use std::sync::atomic::{AtomicU32, Ordering};
        struct Marker(Arc<AtomicU32>, u32, HandlerRef);
        #[async_trait]
        impl Handler for Marker {
            async fn call(&self, ctx: RequestContext, client: Client, params: Option<Value>) -> Result<Value, DomainError> {
                self.0.store(self.1, Ordering::SeqCst);
                self.2.call(ctx, client, params).await
            }
        }
        struct MarkerMw(Arc<AtomicU32>, u32);
        impl Middleware for MarkerMw {
            fn wrap(&self, inner: HandlerRef) -> HandlerRef {
                Arc::new(Marker(self.0.clone(), self.1, inner))
            }
        }

        let order = Arc::new(AtomicU32::new(0));
        let router = Router::new()
            .wrap(Arc::new(MarkerMw(order.clone(), 1)))
            .wrap(Arc::new(MarkerMw(order.clone(), 2)));
        router.register("ping", Arc::new(Echo)).await;
        let (ctx, client) = ctx(Claims::default());
        router.dispatch("ping", ctx, client, None).await.unwrap();
        // The last middleware applied (mw 2, innermost) runs last and
        // overwrites the marker, so its value is what survives.
        assert_eq!(order.load(Ordering::SeqCst), 2);
    }
}
