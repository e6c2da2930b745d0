//! Connection manager.
//!
//! A [`Connection`] keeps one logical connection alive over a transport
//! that may drop at any time.
//!
//! # Lifecycle
//!
//! ```text
//!            connect()             transport open
//!   Idle ───────────────► Connecting ───────────────► Open
//!    │                       ▲    │                     │
//!    │ send() queues         │    │ close, reconnect    │ close, reconnect
//!    │                       │    ▼                     ▼
//!    │               backoff tick ◄──────────── Retrying
//!    │                                             │
//!    │                   exhausted / disconnect()  ▼
//!    └───────────────────────────────────────────► Closed
//! ```
//!
//! - Sends issued while connecting are queued and flushed in order on open
//! - An open that ends a reconnection session fires `Reopen` instead of `Open`
//! - Listeners of one kind fire in registration order
//!
//! # Example
//!
//! ```no_run
//! use ws_reconnect::{Connection, ConnectionConfig, JsonSerializer, ReconnectConfig};
//!
//! # async fn example() -> ws_reconnect::Result<()> {
//! let config = ConnectionConfig::builder("ws://127.0.0.1:8080")
//!     .reconnect(ReconnectConfig::default())
//!     .build()?;
//! let connection = Connection::new(JsonSerializer::<serde_json::Value>::new(), config)?;
//!
//! connection.on_message(|message| println!("received: {message}"));
//! connection.connect();
//! connection.send(serde_json::json!({ "id": 1 }));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Transport event handling and the dispatch loop.
mod dispatch;

/// Listener registry and disposers.
pub mod listeners;

/// Transport ownership state.
pub mod state;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::protocol::{CloseEvent, JsonSerializer, Serializer};
use crate::reconnect::{Reconnect, ReconnectCallbacks};
use crate::transport::{Connector, TransportEvents, WsConnector};

use self::listeners::{Handler, Listeners};
use self::state::{Link, LinkState};

pub(crate) use dispatch::Signal;
pub use listeners::{Disposer, EventKind};
pub use state::Status;

// ============================================================================
// Shared
// ============================================================================

/// State shared by all clones of a connection and its dispatch loop.
pub(crate) struct Shared<S: Serializer> {
    config: ConnectionConfig,
    serializer: S,
    connector: Box<dyn Connector>,
    link: Mutex<Link<S::Outbound>>,
    listeners: Arc<Mutex<Listeners<S::Inbound>>>,
    reconnect: Option<Reconnect>,
    signal_tx: mpsc::UnboundedSender<Signal>,
}

// ============================================================================
// Connection
// ============================================================================

/// Reconnecting connection over a pluggable transport.
///
/// Cloning is cheap; clones share the same connection. Dropping the last
/// clone stops reconnection and closes the transport.
pub struct Connection<S: Serializer = JsonSerializer<serde_json::Value>> {
    shared: Arc<Shared<S>>,
}

impl<S: Serializer> Clone for Connection<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: Serializer> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.shared.config.url().as_str())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection - Constructors
// ============================================================================

impl<S: Serializer> Connection<S> {
    /// Creates a connection using the default WebSocket connector.
    ///
    /// The connection starts idle; call [`Connection::connect`] to dial.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if called outside a Tokio runtime.
    pub fn new(serializer: S, config: ConnectionConfig) -> Result<Self> {
        Self::with_connector(serializer, config, WsConnector::new())
    }

    /// Creates a connection over a custom transport connector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if called outside a Tokio runtime.
    pub fn with_connector(
        serializer: S,
        config: ConnectionConfig,
        connector: impl Connector,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|_| Error::config("Connection must be created within a Tokio runtime"))?;

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let reconnect = config.reconnect().map(|policy| {
            let next_tx = signal_tx.clone();
            let end_tx = signal_tx.clone();
            Reconnect::new(
                policy,
                ReconnectCallbacks {
                    on_next: Arc::new(move || {
                        let _ = next_tx.send(Signal::ReconnectNext);
                    }),
                    on_end: Arc::new(move || {
                        let _ = end_tx.send(Signal::ReconnectEnd);
                    }),
                },
            )
        });

        let shared = Arc::new(Shared {
            config,
            serializer,
            connector: Box::new(connector),
            link: Mutex::new(Link::default()),
            listeners: Arc::new(Mutex::new(Listeners::default())),
            reconnect,
            signal_tx,
        });

        runtime.spawn(dispatch::run_dispatch_loop(Arc::downgrade(&shared), signal_rx));

        debug!(url = %shared.config.url(), "Connection created");

        Ok(Self { shared })
    }
}

// ============================================================================
// Connection - Lifecycle
// ============================================================================

impl<S: Serializer> Connection<S> {
    /// Returns the current status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> Status {
        self.shared.link.lock().state.status()
    }

    /// Returns the configuration the connection was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// Returns `true` while a reconnection session is in progress.
    #[inline]
    #[must_use]
    pub fn is_reconnecting(&self) -> bool {
        self.shared
            .reconnect
            .as_ref()
            .is_some_and(Reconnect::is_started)
    }

    /// Returns the number of payloads waiting for the transport to open.
    #[inline]
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.link.lock().queue.len()
    }

    /// Dials the endpoint without sub-protocols.
    ///
    /// No-op while a transport is owned.
    pub fn connect(&self) {
        self.shared.connect(Some(Vec::new()));
    }

    /// Dials the endpoint requesting the given sub-protocols.
    ///
    /// The protocols are reused by every reconnection attempt. The default
    /// connector still opens if the server selects none of them.
    /// No-op while a transport is owned.
    pub fn connect_with_protocols<I, P>(&self, protocols: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.shared
            .connect(Some(protocols.into_iter().map(Into::into).collect()));
    }

    /// Closes the connection with the default client close event.
    ///
    /// No-op if no transport is owned.
    pub fn disconnect(&self) {
        self.shared.disconnect(CloseEvent::closed_by_client());
    }

    /// Closes the connection, reporting `event` to close listeners.
    ///
    /// No-op if no transport is owned.
    pub fn disconnect_with(&self, event: CloseEvent) {
        self.shared.disconnect(event);
    }
}

// ============================================================================
// Connection - Messaging
// ============================================================================

impl<S: Serializer> Connection<S> {
    /// Sends a payload.
    ///
    /// Returns `true` if the payload was transmitted or queued for the next
    /// open. On `false` the error listeners have been notified.
    pub fn send(&self, payload: S::Outbound) -> bool {
        self.try_send(payload).is_ok()
    }

    /// Sends a payload, reporting why it could not be sent.
    ///
    /// Error listeners are notified on failure as with [`Connection::send`].
    ///
    /// # Errors
    ///
    /// - [`Error::NotReady`] if the connection is closed
    /// - [`Error::Serialize`] / [`Error::Json`] if encoding fails
    /// - [`Error::ConnectionClosed`] if the transport is gone
    pub fn try_send(&self, payload: S::Outbound) -> Result<()> {
        let result = self.shared.send(payload);
        if let Err(e) = &result {
            warn!(error = %e, "Send failed");
            self.shared.notify_signal(EventKind::Error);
        }
        result
    }
}

// ============================================================================
// Connection - Listeners
// ============================================================================

impl<S: Serializer> Connection<S> {
    /// Registers an open listener.
    ///
    /// If the connection is already open the callback runs immediately and
    /// is not retained.
    pub fn on_open<F>(&self, callback: F) -> Disposer
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.status() == Status::Open {
            callback();
            return Disposer::noop();
        }
        self.register(EventKind::Open, Handler::Signal(Arc::new(callback)))
    }

    /// Registers a listener for opens that end a reconnection session.
    pub fn on_reopen<F>(&self, callback: F) -> Disposer
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(EventKind::Reopen, Handler::Signal(Arc::new(callback)))
    }

    /// Registers a listener for decoded incoming messages.
    pub fn on_message<F>(&self, callback: F) -> Disposer
    where
        F: Fn(&S::Inbound) + Send + Sync + 'static,
    {
        self.register(EventKind::Message, Handler::Message(Arc::new(callback)))
    }

    /// Registers a close listener.
    pub fn on_close<F>(&self, callback: F) -> Disposer
    where
        F: Fn(&CloseEvent) + Send + Sync + 'static,
    {
        self.register(EventKind::Close, Handler::Close(Arc::new(callback)))
    }

    /// Registers an error listener. Errors carry no payload.
    pub fn on_error<F>(&self, callback: F) -> Disposer
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(EventKind::Error, Handler::Signal(Arc::new(callback)))
    }

    /// Returns the number of listeners registered for `kind`.
    #[inline]
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.shared.listeners.lock().count(kind)
    }

    fn register(&self, kind: EventKind, handler: Handler<S::Inbound>) -> Disposer {
        let id = self.shared.listeners.lock().add(kind, handler);
        Disposer::new(&self.shared.listeners, kind, id)
    }
}

// ============================================================================
// Shared - Operations
// ============================================================================

impl<S: Serializer> Shared<S> {
    /// Creates a transport unless one is owned.
    ///
    /// `None` reuses the protocols captured by the previous connect.
    fn connect(&self, protocols: Option<Vec<String>>) {
        let mut link = self.link.lock();
        if link.state.has_transport() {
            return;
        }

        if let Some(protocols) = protocols {
            link.protocols = protocols;
        }
        link.generation = link.generation.next();
        let id = link.generation;

        let events = TransportEvents::new(id, self.signal_tx.clone());
        let handle = self
            .connector
            .connect(self.config.url(), &link.protocols, events);
        link.state = LinkState::Connecting { id, handle };

        debug!(transport = %id, url = %self.config.url(), "Connecting");
    }

    /// Closes the owned transport and notifies close listeners.
    fn disconnect(&self, event: CloseEvent) {
        let (handle, dropped) = {
            let mut link = self.link.lock();
            if !link.state.has_transport() {
                return;
            }
            link.close()
        };

        if let Some(reconnect) = &self.reconnect {
            reconnect.stop();
        }

        if dropped > 0 {
            warn!(dropped, "Queued messages dropped on close");
        }
        self.lifecycle("Connection closed", &event);

        self.notify_close(&event);

        if let Some(handle) = handle {
            handle.close();
        }
    }

    /// Queues or transmits a payload.
    fn send(&self, payload: S::Outbound) -> Result<()> {
        let mut link = self.link.lock();
        match link.state.status() {
            Status::Connecting => {
                link.queue.push_back(payload);
                Ok(())
            }
            Status::Open => {
                let handle = link
                    .state
                    .open_handle()
                    .ok_or(Error::ConnectionClosed)?;
                let frame = self.serializer.serialize(&payload)?;
                handle.send(frame)
            }
            Status::Closed => Err(Error::not_ready(Status::Closed)),
        }
    }

    // ========================================================================
    // Notification
    // ========================================================================

    /// Invokes payload-less listeners of `kind`.
    pub(crate) fn notify_signal(&self, kind: EventKind) {
        let handlers = self.listeners.lock().snapshot(kind);
        for handler in handlers {
            if let Handler::Signal(callback) = handler {
                callback();
            }
        }
    }

    /// Invokes message listeners.
    fn notify_message(&self, message: &S::Inbound) {
        let handlers = self.listeners.lock().snapshot(EventKind::Message);
        for handler in handlers {
            if let Handler::Message(callback) = handler {
                callback(message);
            }
        }
    }

    /// Invokes close listeners.
    fn notify_close(&self, event: &CloseEvent) {
        let handlers = self.listeners.lock().snapshot(EventKind::Close);
        for handler in handlers {
            if let Handler::Close(callback) = handler {
                callback(event);
            }
        }
    }

    /// Logs a lifecycle transition; `debug` config promotes it to `info`.
    fn lifecycle(&self, message: &str, detail: &dyn fmt::Debug) {
        if self.config.debug() {
            info!(url = %self.config.url(), detail = ?detail, "{message}");
        } else {
            debug!(url = %self.config.url(), detail = ?detail, "{message}");
        }
    }
}

impl<S: Serializer> Drop for Shared<S> {
    fn drop(&mut self) {
        if let Some(reconnect) = &self.reconnect {
            reconnect.stop();
        }
        if let Some(handle) = self.link.get_mut().state.replace(LinkState::Closed) {
            handle.close();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
