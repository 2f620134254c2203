//! A minimal WebSocket JSON-RPC client used only by `services/server`'s
//! integration tests to drive `/ws` end to end, the way a real session
//! client would — send a frame, wait for the matching response or
//! notification, assert on what comes back.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::MaybeTlsStream;

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct WsTestClient {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
}

impl WsTestClient {
    /// Connects with no bearer token at all — the connection is accepted
    /// unauthenticated per §4.D step 2.
    pub async fn connect(url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (write, read) = stream.split();
        Ok(Self { write, read })
    }

    /// Connects carrying the token as an `Authorization: Bearer` header,
    /// mirroring `rt-test-utils`'s own `connect_with_token`.
    pub async fn connect_with_token(url: &str, token: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let uri: tokio_tungstenite::tungstenite::http::Uri = url.parse()?;
        let host = uri.host().unwrap_or("localhost").to_owned();
        let host_header = match uri.port_u16() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        };
        let request = Request::builder()
            .uri(url)
            .header("Host", host_header)
            .header("Authorization", format!("Bearer {token}"))
            .header("Upgrade", "websocket")
            .header("Connection", "Upgrade")
            .header("Sec-WebSocket-Version", "13")
            .header("Sec-WebSocket-Key", generate_key())
            .body(())?;
        let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
        let (write, read) = stream.split();
        Ok(Self { write, read })
    }

    /// Connects carrying the token as the `?token=` query parameter instead
    /// of a header, exercising the other half of §4.D step 2's "query or
    /// header" token extraction.
    pub async fn connect_with_query_token(base_url: &str, token: &str) -> Result<Self, Box<dyn std::error::Error>> {
        Self::connect(&format!("{base_url}?token={token}")).await
    }

    pub async fn send(&mut self, request: &Value) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Text(serde_json::to_string(request)?.into())).await?;
        Ok(())
    }

    /// Waits for the next text frame, skipping pings/pongs, and parses it
    /// as JSON. Fails the test's `?` chain on a close frame or stream end
    /// rather than hanging.
    pub async fn recv(&mut self) -> Result<Value, Box<dyn std::error::Error>> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) => return Err("connection closed by server".into()),
                Some(Ok(_)) => continue,
                Some(Err(error)) => return Err(error.into()),
                None => return Err("connection stream ended".into()),
            }
        }
    }

    pub async fn recv_timeout(&mut self, duration: std::time::Duration) -> Result<Value, Box<dyn std::error::Error>> {
        tokio::time::timeout(duration, self.recv()).await?
    }

    pub async fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Close(None)).await?;
        Ok(())
    }
}

/// Builds a JSON-RPC request frame. `id: None` produces a notification
/// (the `id` member is omitted entirely, not sent as `null`).
pub fn request(method: &str, params: Value, id: Option<i64>) -> Value {
    let mut frame = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
    });
    if let Some(id) = id {
        frame["id"] = json!(id);
    }
    frame
}
