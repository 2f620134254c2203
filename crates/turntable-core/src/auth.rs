//! Authentication capability boundary.
//!
//! The source validates forwarder/receiver bearer tokens against the
//! database directly inside the WebSocket handler
//! (`services/server/src/auth.rs`'s `validate_token`). Per spec.md §1's
//! non-goal "no specific auth mechanism", we narrow that to a trait so the
//! session server can be wired against whatever identity provider a
//! deployment uses, without the router or hub depending on it directly.

use async_trait::async_trait;

use turntable_protocol::UserId;

use crate::context::Claims;
use crate::error::DomainError;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Resolves a bearer token (or login credentials) into `Claims`. One
/// implementation might check a database-backed session table, another a
/// signed JWT; the router only ever calls this trait.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate_token(&self, token: &str) -> Result<Claims, DomainError>;

    async fn login(&self, credentials: Credentials) -> Result<(Claims, String), DomainError>;

    async fn logout(&self, user_id: &UserId) -> Result<(), DomainError>;
}
