//! Per-request context: deadline, cancellation, and a typed claims bag.
//!
//! The source passes a context as the first argument to every handler and
//! downstream service call (Design Notes, "Context propagation"). Rust has
//! no ambient context type, so we define one explicitly and thread it
//! through the router and every domain-service call.
//!
//! Design Notes also flags "magic string keys" (`"userID"`, `"username"`,
//! `"roles"`) used to stash auth claims on the context in the source. We
//! use a typed `Claims` struct instead of a generic key-value bag for the
//! fields we know about, keeping only genuinely open-ended extras in a
//! typed-key map.

use std::time::{Duration, Instant};

use turntable_protocol::{ClientId, UserId};

mod tokio_util_cancellation {
    //! Minimal cancellation token, in the shape `tokio-util`'s
    //! `CancellationToken` exposes, without pulling in the whole crate for
    //! one type.
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[derive(Clone, Default)]
    pub struct CancellationToken(Arc<Inner>);

    #[derive(Default)]
    struct Inner {
        notify: Notify,
        cancelled: std::sync::atomic::AtomicBool,
    }

    impl CancellationToken {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn cancel(&self) {
            self.0.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
            self.0.notify.notify_waiters();
        }

        pub fn is_cancelled(&self) -> bool {
            self.0.cancelled.load(std::sync::atomic::Ordering::SeqCst)
        }

        pub async fn cancelled(&self) {
            if self.is_cancelled() {
                return;
            }
            self.0.notify.notified().await;
        }
    }
}

pub use tokio_util_cancellation::CancellationToken;

/// Authentication claims resolved for the connection that issued a
/// request. Empty `user_id`/`username` denotes an unauthenticated client
/// (§4.E Auth middleware checks `client.userId` for emptiness).
#[derive(Debug, Clone, Default)]
pub struct Claims {
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub roles: Vec<String>,
}

impl Claims {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Request-scoped context threaded through the router and every downstream
/// service call. Carries the request deadline, a cancellation signal tied
/// to the connection's lifetime, the caller's claims, and the originating
/// client id.
#[derive(Clone)]
pub struct RequestContext {
    deadline: Instant,
    cancellation: CancellationToken,
    client_id: ClientId,
    claims: Claims,
}

impl RequestContext {
    #[must_use]
    pub fn new(client_id: ClientId, claims: Claims, timeout: Duration, cancellation: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancellation,
            client_id,
            claims,
        }
    }

    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    #[must_use]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }
}
