//! Wire types for the turntable realtime session core: the JSON-RPC 2.0
//! envelope, the server-pushed notification union, typed identifiers, and
//! the per-namespace RPC parameter/result structs.
//!
//! This crate has no async runtime dependency and no I/O — it is pulled in
//! by both `turntable-core` and `services/server`, and could equally be
//! pulled in by a client implementation.

pub mod envelope;
pub mod ids;
pub mod methods;
pub mod notification;

pub use envelope::{error_codes, EnvelopeError, Request, RequestId, Response, RpcError};
pub use ids::{ClientId, MediaId, PlaylistId, RoomId, UserId};
pub use notification::{ChatMessageInfo, MediaInfo, Notification, NotificationFrame, VoteKind};
