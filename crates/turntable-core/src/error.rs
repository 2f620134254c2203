//! Domain error taxonomy and its mapping onto the frozen RPC error codes.
//!
//! Mirrors `services/server/src/http/response.rs`'s small set of
//! `json_error`/`not_found`/`conflict` constructors, generalized from one
//! fixed HTTP envelope to the full §7 domain error enum. Handlers return
//! `Result<T, DomainError>`; the router (`crate::router`) is the single
//! place that narrows a `DomainError` into an RPC error response, so a
//! storage or transport error can never leak past the boundary.

use turntable_protocol::{error_codes, RpcError};

use crate::room::state::QueueError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("not authorized")]
    NotAuthorized,
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("invalid token")]
    InvalidToken,
    #[error("session expired")]
    SessionExpired,

    #[error("room not found")]
    RoomNotFound,
    #[error("room full")]
    RoomFull,
    #[error("room closed")]
    RoomClosed,
    #[error("user not in room")]
    UserNotInRoom,
    #[error("user already in room")]
    UserAlreadyInRoom,
    #[error("room already exists")]
    RoomAlreadyExists,
    #[error("user banned from room")]
    UserBanned,

    #[error("media not found")]
    MediaNotFound,
    #[error("media resolution failed: {0}")]
    MediaResolutionFailed(String),

    #[error("playlist not found")]
    PlaylistNotFound,
    #[error("playlist already exists")]
    PlaylistAlreadyExists,

    #[error("user not found")]
    UserNotFound,
    #[error("user already exists")]
    UserAlreadyExists,

    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Anything from a downstream capability (repository, auth provider,
    /// media resolver) that does not map to a named domain error. Its
    /// `message` is logged, never surfaced to the client (§7 "unknown
    /// domain errors MUST NOT leak internal messages").
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    #[must_use]
    pub fn to_rpc_error(&self) -> RpcError {
        let code = match self {
            DomainError::AuthenticationRequired => error_codes::AUTHENTICATION_REQUIRED,
            DomainError::NotAuthorized => error_codes::NOT_AUTHORIZED,
            DomainError::RateLimitExceeded => error_codes::RATE_LIMIT_EXCEEDED,
            DomainError::InvalidToken => error_codes::INVALID_TOKEN,
            DomainError::SessionExpired => error_codes::SESSION_EXPIRED,

            DomainError::RoomNotFound => error_codes::ROOM_NOT_FOUND,
            DomainError::RoomFull => error_codes::ROOM_FULL,
            DomainError::RoomClosed => error_codes::ROOM_CLOSED,
            DomainError::UserNotInRoom => error_codes::USER_NOT_IN_ROOM,
            DomainError::UserAlreadyInRoom | DomainError::RoomAlreadyExists => {
                error_codes::USER_ALREADY_IN_ROOM
            }
            DomainError::UserBanned => error_codes::NOT_AUTHORIZED,

            DomainError::MediaNotFound => error_codes::MEDIA_NOT_FOUND,
            DomainError::MediaResolutionFailed(_) => error_codes::MEDIA_RESOLUTION_FAILED,

            DomainError::PlaylistNotFound => error_codes::PLAYLIST_NOT_FOUND,
            DomainError::PlaylistAlreadyExists => error_codes::PLAYLIST_ALREADY_EXISTS,

            DomainError::UserNotFound => error_codes::USER_NOT_FOUND,
            DomainError::UserAlreadyExists => error_codes::USER_ALREADY_EXISTS,

            DomainError::InvalidParams(_) => error_codes::INVALID_PARAMS,
            DomainError::Internal(_) => error_codes::INTERNAL_ERROR,
        };

        let message = match self {
            // These carry a caller-meaningful detail.
            DomainError::MediaResolutionFailed(m) | DomainError::InvalidParams(m) => m.clone(),
            // Everything else uses the stable, generic message for the code;
            // internal details are logged by the caller, not echoed here.
            DomainError::Internal(_) => "internal error".to_owned(),
            other => other.to_string(),
        };

        RpcError::new(code, message)
    }
}

/// Queue transitions (`crate::room::state::RoomRuntimeState`) have their
/// own small error set since they run under the room lock, independent of
/// the repository/auth/media capabilities `DomainError` otherwise covers.
/// None of them warrant a dedicated RPC error code, so they fold onto the
/// closest existing one.
impl From<QueueError> for DomainError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotInAudience => DomainError::UserNotInRoom,
            QueueError::NotCurrentDj | QueueError::NotPermitted => DomainError::NotAuthorized,
            QueueError::AlreadyQueued | QueueError::AlreadyPlaying | QueueError::DjCannotVoteOwnTrack | QueueError::NothingPlaying => DomainError::InvalidParams(err.to_string()),
        }
    }
}
