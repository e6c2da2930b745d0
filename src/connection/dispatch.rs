//! Dispatch loop and transport event handling.
//!
//! Transport events and backoff callbacks arrive as [`Signal`]s on one
//! channel and are handled one at a time by a single task, so each event
//! mutates state and notifies listeners before the next one is looked at.
//!
//! No lock is held while listeners run.

// ============================================================================
// Imports
// ============================================================================

use std::mem;
use std::sync::Weak;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::identifiers::TransportId;
use crate::protocol::{CloseEvent, Frame, Serializer};
use crate::transport::TransportEvent;

use super::state::LinkState;
use super::{EventKind, Shared};

// ============================================================================
// Signal
// ============================================================================

/// Input of the dispatch loop.
#[derive(Debug)]
pub(crate) enum Signal {
    /// Event from a transport attempt.
    Transport {
        id: TransportId,
        event: TransportEvent,
    },
    /// Backoff timer fired.
    ReconnectNext,
    /// Backoff attempts exhausted.
    ReconnectEnd,
}

// ============================================================================
// Dispatch Loop
// ============================================================================

/// Handles signals until the connection is dropped.
pub(super) async fn run_dispatch_loop<S: Serializer>(
    weak: Weak<Shared<S>>,
    mut signal_rx: mpsc::UnboundedReceiver<Signal>,
) {
    while let Some(signal) = signal_rx.recv().await {
        let Some(shared) = weak.upgrade() else {
            break;
        };
        shared.handle_signal(signal);
    }

    trace!("Dispatch loop terminated");
}

// ============================================================================
// Shared - Event Handling
// ============================================================================

impl<S: Serializer> Shared<S> {
    fn handle_signal(&self, signal: Signal) {
        match signal {
            Signal::Transport { id, event } => match event {
                TransportEvent::Open => self.handle_open(id),
                TransportEvent::Message(frame) => self.handle_message(id, frame),
                TransportEvent::Error(detail) => self.handle_error(id, &detail),
                TransportEvent::Close(event) => self.handle_close(id, event),
            },
            Signal::ReconnectNext => self.handle_reconnect_next(),
            Signal::ReconnectEnd => self.handle_reconnect_end(),
        }
    }

    /// Transport opened: notify, then flush the queue.
    fn handle_open(&self, id: TransportId) {
        {
            let mut link = self.link.lock();
            if !link.is_current(id) || !matches!(link.state, LinkState::Connecting { .. }) {
                trace!(transport = %id, "Ignoring open from stale transport");
                return;
            }
            link.state.promote(|id, handle| LinkState::Open { id, handle });
            link.last_error = false;
        }

        let reopened = match &self.reconnect {
            Some(reconnect) if reconnect.is_started() => {
                reconnect.stop();
                true
            }
            _ => false,
        };

        if reopened {
            self.lifecycle("Connection reopened", &id);
            self.notify_signal(EventKind::Reopen);
        } else {
            self.lifecycle("Connection opened", &id);
            self.notify_signal(EventKind::Open);
        }

        let failures = self.flush_queue(id);
        for _ in 0..failures {
            self.notify_signal(EventKind::Error);
        }
    }

    /// Transmits queued payloads in submission order.
    ///
    /// Returns the number of payloads that failed.
    fn flush_queue(&self, id: TransportId) -> usize {
        let mut link = self.link.lock();
        if !link.is_current(id) || link.state.open_handle().is_none() {
            return 0;
        }

        let queue = mem::take(&mut link.queue);
        let Some(handle) = link.state.open_handle() else {
            return 0;
        };

        let total = queue.len();
        let mut failures = 0;
        for payload in queue {
            let sent = self
                .serializer
                .serialize(&payload)
                .and_then(|frame| handle.send(frame));
            if let Err(e) = sent {
                warn!(transport = %id, error = %e, "Failed to flush queued message");
                failures += 1;
            }
        }

        if total > 0 {
            debug!(transport = %id, total, failures, "Flushed queued messages");
        }
        failures
    }

    /// Frame arrived: decode and notify.
    fn handle_message(&self, id: TransportId, frame: Frame) {
        if !self.link.lock().is_current(id) {
            trace!(transport = %id, "Ignoring message from stale transport");
            return;
        }

        match self.serializer.deserialize(frame) {
            Ok(message) => self.notify_message(&message),
            Err(e) => {
                warn!(transport = %id, error = %e, "Failed to decode message");
                self.notify_signal(EventKind::Error);
            }
        }
    }

    /// Transport error: notify without payload and remember it.
    fn handle_error(&self, id: TransportId, detail: &str) {
        if !self.link.lock().is_current(id) {
            trace!(transport = %id, "Ignoring error from stale transport");
            return;
        }

        self.lifecycle("Transport error", &detail);
        self.notify_signal(EventKind::Error);
        self.link.lock().last_error = true;
    }

    /// Transport closed: start or continue a reconnection session, or close.
    fn handle_close(&self, id: TransportId, event: CloseEvent) {
        let retry = {
            let mut link = self.link.lock();
            if !link.is_current(id) || matches!(link.state, LinkState::Retrying { .. }) {
                trace!(transport = %id, "Ignoring close from stale transport");
                return;
            }

            let retry = self
                .reconnect
                .as_ref()
                .is_some_and(|reconnect| link.last_error || reconnect.can_apply(event.code));
            if retry {
                link.state
                    .promote(|id, handle| LinkState::Retrying { id, handle });
            }
            retry
        };

        match (&self.reconnect, retry) {
            (Some(reconnect), true) => {
                debug!(transport = %id, code = %event.code, reason = %event.reason, "Transport closed, reconnecting");
                reconnect.start();
            }
            _ => {
                self.lifecycle("Connection stopped", &event);
                self.disconnect(event);
            }
        }
    }

    /// Backoff tick: drop the dead transport and dial again.
    fn handle_reconnect_next(&self) {
        let stale = {
            let mut link = self.link.lock();
            if !matches!(link.state, LinkState::Retrying { .. }) {
                trace!("Ignoring reconnect tick outside a session");
                return;
            }
            link.state.replace(LinkState::Idle)
        };
        drop(stale);

        if let Some(reconnect) = &self.reconnect {
            debug!(attempt = reconnect.attempts(), "Reconnecting");
        }
        self.connect(None);
    }

    /// Backoff gave up: close for good.
    fn handle_reconnect_end(&self) {
        if !matches!(self.link.lock().state, LinkState::Retrying { .. }) {
            trace!("Ignoring reconnect end outside a session");
            return;
        }

        self.disconnect(CloseEvent::reconnect_failed());
    }
}
