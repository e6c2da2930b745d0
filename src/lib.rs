//! WS Reconnect - Reconnecting WebSocket connection manager.
//!
//! This library keeps one logical duplex connection alive over a transport
//! that may drop at any time, retrying with a bounded backoff and queueing
//! outbound messages until the transport is open.
//!
//! # Architecture
//!
//! Each [`Connection`] owns:
//!
//! - **Transport**: one attempt at a time, created by a [`Connector`]
//! - **Dispatch loop**: a Tokio task handling transport events in arrival order
//! - **Backoff**: an optional [`Reconnect`] scheduler driving retry attempts
//! - **Listeners**: per-event callbacks removed through a [`Disposer`]
//!
//! Key design principles:
//!
//! - Events from a replaced transport are ignored
//! - Sends issued while connecting are flushed in submission order on open
//! - An open that ends a reconnection session is reported as `Reopen`
//! - Payloads are encoded by a pluggable [`Serializer`] (JSON by default)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use ws_reconnect::{
//!     Connection, ConnectionConfig, DelayIncrease, JsonSerializer, ReconnectConfig, Result,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let policy = ReconnectConfig::new(Duration::from_millis(500), 5)
//!         .with_delay_increase(DelayIncrease::Doubling)
//!         .with_skip_close_codes([1000u16]);
//!
//!     let config = ConnectionConfig::builder("ws://127.0.0.1:8080")
//!         .reconnect(policy)
//!         .build()?;
//!
//!     let connection = Connection::new(JsonSerializer::<serde_json::Value>::new(), config)?;
//!
//!     connection.on_open(|| println!("open"));
//!     connection.on_reopen(|| println!("reopened"));
//!     connection.on_message(|message| println!("received: {message}"));
//!     connection.on_close(|event| println!("closed: {} {}", event.code, event.reason));
//!
//!     connection.connect();
//!     connection.send(serde_json::json!({ "type": "hello" }));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Connection and reconnect configuration |
//! | [`connection`] | [`Connection`] manager, listeners and status |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Close codes, frames and serializers |
//! | [`reconnect`] | Backoff scheduler |
//! | [`transport`] | Transport seam and the WebSocket connector |

// ============================================================================
// Modules
// ============================================================================

/// Connection configuration.
///
/// Use [`ConnectionConfig::builder()`] or [`ConnectionConfig::from_json()`].
pub mod config;

/// Connection manager.
///
/// - [`Connection`] - Reconnecting connection
/// - [`Status`] - Observable status
/// - [`Disposer`] - Listener removal handle
pub mod connection;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for listeners and transport attempts.
pub mod identifiers;

/// Close codes, frames and payload serializers.
pub mod protocol;

/// Backoff scheduler for reconnection sessions.
pub mod reconnect;

/// Transport layer.
///
/// Defines the [`Connector`] seam and ships a WebSocket implementation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Config types
pub use config::{ConnectionConfig, ConnectionConfigBuilder, DelayIncrease, ReconnectConfig};

// Connection types
pub use connection::{Connection, Disposer, EventKind, Status};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ListenerId, TransportId};

// Protocol types
pub use protocol::{CloseCode, CloseEvent, Frame, JsonSerializer, Serializer};

// Reconnect types
pub use reconnect::{Reconnect, ReconnectCallbacks, ReconnectState};

// Transport types
pub use transport::{Connector, TransportEvent, TransportEvents, TransportHandle, WsConnector};
