//! WebSocket connector and per-attempt event loop.
//!
//! Each call to [`WsConnector::connect`] spawns one tokio task that:
//!
//! - Performs the client handshake (`connect_async`)
//! - Reports open / message / error / close through [`TransportEvents`]
//! - Forwards frames and close requests from the returned handle
//!
//! Dropping the handle closes the command channel, which closes the socket.

// ============================================================================
// Imports
// ============================================================================

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::error::{ProtocolError, SubProtocolError};
use tokio_tungstenite::tungstenite::{Error as WsError, Message, Utf8Bytes};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{CloseCode, CloseEvent, Frame};

use super::{Connector, TransportEvents, TransportHandle};

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// TransportCommand
// ============================================================================

/// Internal commands for the transport task.
#[derive(Debug)]
enum TransportCommand {
    /// Transmit a frame.
    Send(Frame),
    /// Close the socket.
    Close,
}

// ============================================================================
// WsConnector
// ============================================================================

/// Default connector: one WebSocket per attempt.
///
/// `http`/`https` URLs are dialled as `ws`/`wss`. Protocols are sent in the
/// `Sec-WebSocket-Protocol` header; if the server accepts without selecting
/// one, the handshake is repeated once without the header.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Creates the connector.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    fn connect(
        &self,
        url: &Url,
        protocols: &[String],
        events: TransportEvents,
    ) -> Box<dyn TransportHandle> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_transport(
            url.clone(),
            protocols.to_vec(),
            events,
            command_rx,
        ));

        Box::new(WsHandle { command_tx })
    }
}

// ============================================================================
// WsHandle
// ============================================================================

/// Handle to a WebSocket transport task.
struct WsHandle {
    /// Channel for sending commands to the transport task.
    command_tx: mpsc::UnboundedSender<TransportCommand>,
}

impl TransportHandle for WsHandle {
    fn send(&self, frame: Frame) -> Result<()> {
        self.command_tx
            .send(TransportCommand::Send(frame))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&self) {
        let _ = self.command_tx.send(TransportCommand::Close);
    }
}

// ============================================================================
// Transport Task
// ============================================================================

/// Outcome of one client handshake.
enum Handshake {
    Connected(WsStream),
    Failed(WsError),
    /// Handle closed or dropped before the socket opened.
    Cancelled,
}

/// Dials the endpoint, then pumps frames until either side closes.
async fn run_transport(
    url: Url,
    protocols: Vec<String>,
    events: TransportEvents,
    mut command_rx: mpsc::UnboundedReceiver<TransportCommand>,
) {
    let mut outcome = match build_request(&url, &protocols) {
        Ok(request) => handshake(request, &events, &mut command_rx).await,
        Err(e) => {
            warn!(transport = %events.id(), error = %e, "Invalid handshake request");
            report_failure(&events, &e);
            return;
        }
    };

    // Servers may accept without selecting any of the offered protocols.
    let offered_unselected = matches!(&outcome, Handshake::Failed(e) if is_missing_subprotocol(e));
    if offered_unselected {
        debug!(transport = %events.id(), ?protocols, "Server selected no sub-protocol, retrying without");
        outcome = match build_request(&url, &[]) {
            Ok(request) => handshake(request, &events, &mut command_rx).await,
            Err(e) => {
                warn!(transport = %events.id(), error = %e, "Invalid handshake request");
                report_failure(&events, &e);
                return;
            }
        };
    }

    let ws_stream = match outcome {
        Handshake::Connected(stream) => stream,
        Handshake::Failed(e) => {
            debug!(transport = %events.id(), error = %e, "WebSocket connect failed");
            report_failure(&events, &e);
            return;
        }
        Handshake::Cancelled => return,
    };

    trace!(transport = %events.id(), %url, "WebSocket handshake completed");
    events.open();

    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            // Incoming frames from the peer
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        events.message(Frame::Text(text.as_str().to_owned()));
                    }

                    Some(Ok(Message::Binary(bytes))) => {
                        events.message(Frame::Binary(bytes.to_vec()));
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let event = frame.map_or_else(
                            || CloseEvent::new(CloseCode::NO_STATUS_RESERVED, ""),
                            |f| CloseEvent::new(u16::from(f.code), f.reason.as_str()),
                        );
                        debug!(transport = %events.id(), code = %event.code, "WebSocket closed by remote");
                        // Sends the queued close reply before the socket is dropped
                        let _ = ws_write.close().await;
                        events.close(event);
                        break;
                    }

                    Some(Err(e)) => {
                        error!(transport = %events.id(), error = %e, "WebSocket error");
                        events.error(e.to_string());
                        events.close(CloseEvent::abnormal(""));
                        break;
                    }

                    None => {
                        debug!(transport = %events.id(), "WebSocket stream ended");
                        events.close(CloseEvent::abnormal(""));
                        break;
                    }

                    // Ignore Ping, Pong, raw frames
                    _ => {}
                }
            }

            // Commands from the connection
            command = command_rx.recv() => {
                match command {
                    Some(TransportCommand::Send(frame)) => {
                        if let Err(e) = ws_write.send(frame.into()).await {
                            warn!(transport = %events.id(), error = %e, "Failed to send frame");
                            events.error(e.to_string());
                        }
                    }

                    Some(TransportCommand::Close) | None => {
                        let close = CloseFrame {
                            code: WsCloseCode::Normal,
                            reason: Utf8Bytes::from_static(""),
                        };
                        let _ = ws_write.send(Message::Close(Some(close))).await;
                        let _ = ws_write.close().await;
                        debug!(transport = %events.id(), "WebSocket closed by client");
                        break;
                    }
                }
            }
        }
    }

    trace!(transport = %events.id(), "Transport task terminated");
}

/// Runs the client handshake while honouring close requests from the handle.
async fn handshake(
    request: Request,
    events: &TransportEvents,
    command_rx: &mut mpsc::UnboundedReceiver<TransportCommand>,
) -> Handshake {
    let connect = connect_async(request);
    tokio::pin!(connect);

    loop {
        tokio::select! {
            result = &mut connect => {
                return match result {
                    Ok((stream, _response)) => Handshake::Connected(stream),
                    Err(e) => Handshake::Failed(e),
                };
            }

            command = command_rx.recv() => {
                match command {
                    Some(TransportCommand::Send(_)) => {
                        warn!(transport = %events.id(), "Frame sent before open, dropped");
                    }
                    Some(TransportCommand::Close) | None => {
                        debug!(transport = %events.id(), "Transport closed before open");
                        return Handshake::Cancelled;
                    }
                }
            }
        }
    }
}

/// Reports a failed attempt as an error followed by an abnormal close.
fn report_failure(events: &TransportEvents, error: &dyn std::fmt::Display) {
    events.error(error.to_string());
    events.close(CloseEvent::abnormal(""));
}

/// Returns `true` if the server answered without a `Sec-WebSocket-Protocol`.
fn is_missing_subprotocol(error: &WsError) -> bool {
    matches!(
        error,
        WsError::Protocol(ProtocolError::SecWebSocketSubProtocolError(
            SubProtocolError::NoSubProtocol
        ))
    )
}

/// Builds the handshake request for `url` and `protocols`.
fn build_request(url: &Url, protocols: &[String]) -> Result<Request> {
    let target = websocket_url(url);
    let mut request = target.as_str().into_client_request()?;

    if !protocols.is_empty() {
        let value = HeaderValue::from_str(&protocols.join(", "))
            .map_err(|e| Error::config(format!("Invalid protocol list: {e}")))?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    }

    Ok(request)
}

/// Maps `http`/`https` onto `ws`/`wss`.
fn websocket_url(url: &Url) -> Url {
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return url.clone(),
    };

    let mut target = url.clone();
    // Switching between special schemes never fails.
    let _ = target.set_scheme(scheme);
    target
}

// ============================================================================
// Tests
// ============================================================================
