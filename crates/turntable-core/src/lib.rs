//! The realtime session core: the Hub, the RPC router, the room manager
//! and its DJ queue state machine, the presence registry boundary, and
//! the maintenance reconciliation task.
//!
//! This crate owns no transport and no persistence — those are the
//! session server's job (`services/server`) and the narrow capability
//! traits in [`auth`], [`media`], [`repository`] and [`presence`]
//! respectively. Everything here is pure in-process coordination, built
//! to be exercised directly in tests without standing up a socket.

pub mod auth;
pub mod client;
pub mod context;
pub mod error;
pub mod hub;
pub mod maintenance;
pub mod media;
pub mod presence;
pub mod repository;
pub mod room;
pub mod router;

pub use client::{Client, OutboundMessage};
pub use context::{CancellationToken, Claims, RequestContext};
pub use error::DomainError;
pub use hub::Hub;
pub use maintenance::Maintenance;
pub use room::state::RoomRuntimeState;
pub use room::RoomManager;
pub use router::{Handler, HandlerRef, Middleware, Router};
