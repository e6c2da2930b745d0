//! Transport ownership state.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::mem;

use serde::Serialize;

use crate::identifiers::TransportId;
use crate::transport::TransportHandle;

// ============================================================================
// Status
// ============================================================================

/// Observable connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting for a transport to open; sends are queued.
    Connecting,
    /// Transport is open; sends go out immediately.
    Open,
    /// Closed by the client, the peer, or an exhausted reconnection.
    Closed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// LinkState
// ============================================================================

/// Who owns the transport right now.
pub(crate) enum LinkState {
    /// No transport yet. Reported as `Connecting`.
    Idle,
    /// Attempt in flight.
    Connecting {
        id: TransportId,
        handle: Box<dyn TransportHandle>,
    },
    /// Transport open.
    Open {
        id: TransportId,
        handle: Box<dyn TransportHandle>,
    },
    /// Transport dropped, waiting for the next backoff tick.
    Retrying {
        id: TransportId,
        handle: Box<dyn TransportHandle>,
    },
    /// Terminal until the next `connect`.
    Closed,
}

impl LinkState {
    /// Status derived from the state.
    pub(crate) fn status(&self) -> Status {
        match self {
            Self::Idle | Self::Connecting { .. } | Self::Retrying { .. } => Status::Connecting,
            Self::Open { .. } => Status::Open,
            Self::Closed => Status::Closed,
        }
    }

    /// ID of the owned transport.
    pub(crate) fn transport_id(&self) -> Option<TransportId> {
        match self {
            Self::Connecting { id, .. } | Self::Open { id, .. } | Self::Retrying { id, .. } => {
                Some(*id)
            }
            Self::Idle | Self::Closed => None,
        }
    }

    /// Returns `true` if a transport handle is owned.
    #[inline]
    pub(crate) fn has_transport(&self) -> bool {
        self.transport_id().is_some()
    }

    /// Handle of the open transport.
    pub(crate) fn open_handle(&self) -> Option<&dyn TransportHandle> {
        match self {
            Self::Open { handle, .. } => Some(handle.as_ref()),
            _ => None,
        }
    }

    /// Replaces the state, returning the handle previously owned.
    pub(crate) fn replace(&mut self, next: LinkState) -> Option<Box<dyn TransportHandle>> {
        match mem::replace(self, next) {
            Self::Connecting { handle, .. } | Self::Open { handle, .. } | Self::Retrying { handle, .. } => {
                Some(handle)
            }
            Self::Idle | Self::Closed => None,
        }
    }

    /// Moves the owned handle into the state built by `next`.
    ///
    /// No-op if no handle is owned.
    pub(crate) fn promote(
        &mut self,
        next: impl FnOnce(TransportId, Box<dyn TransportHandle>) -> LinkState,
    ) {
        let Some(id) = self.transport_id() else {
            return;
        };
        if let Some(handle) = self.replace(Self::Idle) {
            *self = next(id, handle);
        }
    }
}

// ============================================================================
// Link
// ============================================================================

/// Transport state plus everything that must change atomically with it.
pub(crate) struct Link<T> {
    pub(crate) state: LinkState,
    /// Payloads accepted while connecting.
    pub(crate) queue: VecDeque<T>,
    /// Transport reported an error since the last successful open.
    pub(crate) last_error: bool,
    /// Protocols captured by the last `connect`.
    pub(crate) protocols: Vec<String>,
    /// Last transport generation handed out.
    pub(crate) generation: TransportId,
}

impl<T> Default for Link<T> {
    fn default() -> Self {
        Self {
            state: LinkState::Idle,
            queue: VecDeque::new(),
            last_error: false,
            protocols: Vec::new(),
            generation: TransportId::default(),
        }
    }
}

impl<T> Link<T> {
    /// Returns `true` if `id` is the transport currently owned.
    #[inline]
    pub(crate) fn is_current(&self, id: TransportId) -> bool {
        self.state.transport_id() == Some(id)
    }

    /// Moves to `Closed`, dropping queued payloads.
    ///
    /// Returns the released handle and the number of dropped payloads.
    pub(crate) fn close(&mut self) -> (Option<Box<dyn TransportHandle>>, usize) {
        let dropped = self.queue.len();
        self.queue.clear();
        (self.state.replace(LinkState::Closed), dropped)
    }
}

// ============================================================================
// Tests
// ============================================================================
