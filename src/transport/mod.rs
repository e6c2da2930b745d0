//! Transport boundary.
//!
//! The connection never talks to a socket directly. It asks a [`Connector`]
//! for a fresh [`TransportHandle`] on every attempt and receives lifecycle
//! events through the [`TransportEvents`] sink handed to that attempt.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  connect(url, protocols, events)  ┌──────────────────┐
//! │    Connection    │──────────────────────────────────►│    Connector     │
//! │                  │◄──── Box<dyn TransportHandle> ────│                  │
//! │  dispatch loop   │                                   └──────────────────┘
//! │        ▲         │       open / message / error / close
//! │        └─────────┼──────────── TransportEvents ◄──── transport task
//! └──────────────────┘
//! ```
//!
//! Every attempt gets its own [`TransportId`]; events from a replaced
//! attempt are ignored by the connection.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | Default `tokio-tungstenite` connector |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connector built on `tokio-tungstenite`.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;
use tracing::trace;
use url::Url;

use crate::connection::Signal;
use crate::error::Result;
use crate::identifiers::TransportId;
use crate::protocol::{CloseEvent, Frame};

pub use websocket::WsConnector;

// ============================================================================
// TransportEvent
// ============================================================================

/// Lifecycle event reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Transport is ready to carry frames.
    Open,
    /// A frame arrived.
    Message(Frame),
    /// Transport reported an error.
    Error(String),
    /// Transport closed.
    Close(CloseEvent),
}

// ============================================================================
// TransportEvents
// ============================================================================

/// Event sink bound to one transport attempt.
///
/// Cheap to clone. Reporting after the connection is gone is a no-op.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    id: TransportId,
    signal_tx: mpsc::UnboundedSender<Signal>,
}

impl TransportEvents {
    pub(crate) fn new(id: TransportId, signal_tx: mpsc::UnboundedSender<Signal>) -> Self {
        Self { id, signal_tx }
    }

    /// Returns the attempt this sink reports for.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TransportId {
        self.id
    }

    /// Reports that the transport opened.
    pub fn open(&self) {
        self.emit(TransportEvent::Open);
    }

    /// Reports an incoming frame.
    pub fn message(&self, frame: Frame) {
        self.emit(TransportEvent::Message(frame));
    }

    /// Reports a transport error.
    pub fn error(&self, detail: impl Into<String>) {
        self.emit(TransportEvent::Error(detail.into()));
    }

    /// Reports that the transport closed.
    pub fn close(&self, event: CloseEvent) {
        self.emit(TransportEvent::Close(event));
    }

    /// Reports an arbitrary event.
    pub fn emit(&self, event: TransportEvent) {
        let signal = Signal::Transport { id: self.id, event };
        if self.signal_tx.send(signal).is_err() {
            trace!(transport = %self.id, "Connection gone, event dropped");
        }
    }
}

// ============================================================================
// TransportHandle
// ============================================================================

/// Handle to one live transport attempt.
///
/// Dropping the handle must tear the transport down.
pub trait TransportHandle: Send + Sync {
    /// Transmits a frame.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConnectionClosed`] if the transport is gone.
    fn send(&self, frame: Frame) -> Result<()>;

    /// Starts closing the transport.
    fn close(&self);
}

// ============================================================================
// Connector
// ============================================================================

/// Factory for transport attempts.
pub trait Connector: Send + Sync + 'static {
    /// Starts a new transport towards `url`.
    ///
    /// Must not block: the attempt proceeds in the background and reports
    /// through `events`.
    fn connect(&self, url: &Url, protocols: &[String], events: TransportEvents)
    -> Box<dyn TransportHandle>;
}

// ============================================================================
// Tests
// ============================================================================
