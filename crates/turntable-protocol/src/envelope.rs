//! JSON-RPC 2.0 request/response envelope.
//!
//! An `id` of JSON `null` is distinct from an absent `id` (the latter marks
//! a notification). We model that with the "double option" pattern: the
//! outer `Option` tracks field presence, the inner one carries `null` vs a
//! real id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(
        default,
        with = "::serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<Option<RequestId>>,
}

impl Request {
    /// A request is a notification when the `id` member was absent from the
    /// frame entirely — not merely when it was `null`.
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Parse a single inbound frame.
///
/// Rejects malformed JSON (`ParseError`) and requests missing/mismatched
/// `jsonrpc` or an absent/empty `method` (`InvalidRequest`).
pub fn parse_request(raw: &str) -> Result<Request, EnvelopeError> {
    let trimmed = raw.trim();
    let request: Request =
        serde_json::from_str(trimmed).map_err(|e| EnvelopeError::ParseError(e.to_string()))?;
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(EnvelopeError::InvalidRequest(format!(
            "unsupported jsonrpc version: {}",
            request.jsonrpc
        )));
    }
    if request.method.is_empty() {
        return Err(EnvelopeError::InvalidRequest("missing method".to_owned()));
    }
    Ok(request)
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EnvelopeError {
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl EnvelopeError {
    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            EnvelopeError::ParseError(_) => error_codes::PARSE_ERROR,
            EnvelopeError::InvalidRequest(_) => error_codes::INVALID_REQUEST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(with = "::serde_with::rust::double_option", default)]
    pub id: Option<Option<RequestId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    #[must_use]
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(id: Option<RequestId>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: Some(id),
            result: None,
            error: Some(error),
        }
    }
}

/// Frozen JSON-RPC 2.0 + application error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    pub const AUTHENTICATION_REQUIRED: i64 = -32001;
    pub const NOT_AUTHORIZED: i64 = -32002;
    pub const RATE_LIMIT_EXCEEDED: i64 = -32003;
    pub const INVALID_TOKEN: i64 = -32004;
    pub const SESSION_EXPIRED: i64 = -32005;

    pub const ROOM_NOT_FOUND: i64 = -32100;
    pub const ROOM_FULL: i64 = -32101;
    pub const ROOM_CLOSED: i64 = -32102;
    pub const USER_NOT_IN_ROOM: i64 = -32103;
    pub const USER_ALREADY_IN_ROOM: i64 = -32104;

    pub const MEDIA_NOT_FOUND: i64 = -32200;
    pub const MEDIA_RESOLUTION_FAILED: i64 = -32201;

    pub const PLAYLIST_NOT_FOUND: i64 = -32300;
    pub const PLAYLIST_ALREADY_EXISTS: i64 = -32301;

    pub const USER_NOT_FOUND: i64 = -32400;
    pub const USER_ALREADY_EXISTS: i64 = -32401;
}
