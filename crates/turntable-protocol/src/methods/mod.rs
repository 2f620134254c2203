//! Per-namespace RPC parameter/result types, mirroring the method surface
//! table (`session`, `user`, `room`, `queue`, `chat`, `media`,
//! `playlist`, `meta`).

pub mod chat;
pub mod media;
pub mod playlist;
pub mod queue;
pub mod room;
pub mod session;
pub mod user;

pub mod meta {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PingResult(pub String);

    impl Default for PingResult {
        fn default() -> Self {
            Self("pong".to_owned())
        }
    }
}
