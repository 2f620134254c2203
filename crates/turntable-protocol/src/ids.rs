//! Typed identifiers.
//!
//! Design Notes in the originating spec call out that the source stashes
//! auth claims and entity references behind untyped string keys. We use a
//! dedicated newtype per identifier kind instead, so a `UserId` can never be
//! passed where a `RoomId` is expected.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Opaque 12-byte room identifier, serialized as lowercase hex (24 chars).
///
/// Laid out like a Mongo `ObjectId`: a 4-byte creation timestamp followed by
/// 8 random bytes, so ids sort roughly by creation order without requiring a
/// central counter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId([u8; 12]);

impl RoomId {
    #[must_use]
    pub fn generate(now_unix_secs: u32) -> Self {
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&now_unix_secs.to_be_bytes());
        rand::rng().fill_bytes(&mut bytes[4..]);
        Self(bytes)
    }

    #[must_use]
    pub fn to_hex(self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid room id: {0}")]
pub struct RoomIdParseError(String);

impl FromStr for RoomId {
    type Err = RoomIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 24 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(RoomIdParseError(s.to_owned()));
        }
        let mut bytes = [0u8; 12];
        for (i, chunk) in bytes.iter_mut().enumerate() {
            *chunk = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| RoomIdParseError(s.to_owned()))?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for RoomId {
    type Error = RoomIdParseError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoomId> for String {
    fn from(value: RoomId) -> Self {
        value.to_hex()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoomId({})", self.to_hex())
    }
}

macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

string_id!(UserId, "Opaque user identifier, issued by the external identity store.");
string_id!(MediaId, "Opaque media identifier, issued by the external media catalog.");
string_id!(PlaylistId, "Opaque playlist identifier.");

/// Server-local client (connection) identifier. Never persisted, never
/// shared across instances — scoped to the lifetime of one transport
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub uuid::Uuid);

impl ClientId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
