//! Local WebSocket peer for integration tests.

#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, anyhow};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

/// Installs a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// TestServer
// ============================================================================

/// Listener bound to a random localhost port.
pub struct TestServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl TestServer {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Accepts one client, echoing back the first requested sub-protocol.
    pub async fn accept(&self) -> anyhow::Result<Peer> {
        let (stream, _) = timeout(WAIT, self.listener.accept())
            .await
            .context("no client connected")??;

        let mut requested = Vec::new();
        let callback = |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
            if let Some(header) = request.headers().get(SEC_WEBSOCKET_PROTOCOL) {
                requested = header
                    .to_str()
                    .unwrap_or_default()
                    .split(',')
                    .map(|p| p.trim().to_owned())
                    .filter(|p| !p.is_empty())
                    .collect();
                if let Some(first) = requested.first() {
                    let value = HeaderValue::from_str(first).expect("valid protocol");
                    response.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
                }
            }
            Ok(response)
        };

        let stream = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
        Ok(Peer {
            stream,
            protocols: requested,
        })
    }
}

// ============================================================================
// Peer
// ============================================================================

/// Server side of one accepted client.
pub struct Peer {
    stream: WebSocketStream<TcpStream>,
    pub protocols: Vec<String>,
}

impl Peer {
    /// Next data or close message, skipping control frames.
    pub async fn next_message(&mut self) -> anyhow::Result<Message> {
        loop {
            let message = timeout(WAIT, self.stream.next())
                .await
                .context("peer timed out")?
                .ok_or_else(|| anyhow!("client went away"))??;
            if !matches!(message, Message::Ping(_) | Message::Pong(_)) {
                return Ok(message);
            }
        }
    }

    pub async fn recv_json(&mut self) -> anyhow::Result<Value> {
        match self.next_message().await? {
            Message::Text(text) => Ok(serde_json::from_str(text.as_str())?),
            other => Err(anyhow!("expected text frame, got {other:?}")),
        }
    }

    pub async fn send_json(&mut self, value: &Value) -> anyhow::Result<()> {
        self.stream.send(Message::text(value.to_string())).await?;
        Ok(())
    }

    pub async fn send_binary(&mut self, bytes: Vec<u8>) -> anyhow::Result<()> {
        self.stream.send(Message::binary(bytes)).await?;
        Ok(())
    }

    /// Sends a close frame and drains until the client answers.
    pub async fn close(mut self, code: u16, reason: &'static str) -> anyhow::Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Utf8Bytes::from_static(reason),
        };
        self.stream.close(Some(frame)).await?;
        while let Ok(Some(Ok(_))) = timeout(WAIT, self.stream.next()).await {}
        Ok(())
    }

    /// Drops the TCP stream without a closing handshake.
    pub fn drop_abruptly(self) {
        drop(self.stream);
    }
}
