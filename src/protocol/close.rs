//! Close codes and close events.
//!
//! Close codes follow the standard WebSocket numbering (RFC 6455 §7.4.1).
//! Application codes (4000-4999) pass through untouched.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// CloseCode
// ============================================================================

/// Numeric status accompanying a closed transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloseCode(u16);

impl CloseCode {
    /// Normal closure; the purpose of the connection has been fulfilled.
    pub const NORMAL: Self = Self(1000);

    /// Endpoint is going away (server shutdown, page navigation).
    pub const GOING_AWAY: Self = Self(1001);

    /// Endpoint terminated the connection due to a protocol error.
    pub const PROTOCOL_ERROR: Self = Self(1002);

    /// Endpoint received a type of data it cannot accept.
    pub const UNSUPPORTED_DATA: Self = Self(1003);

    /// Reserved.
    pub const RESERVED: Self = Self(1004);

    /// No status code was present.
    pub const NO_STATUS_RESERVED: Self = Self(1005);

    /// Closed without a close frame.
    pub const ABNORMAL_CLOSURE_RESERVED: Self = Self(1006);

    /// Message data was inconsistent with its type (e.g. non-UTF-8 text).
    pub const INVALID_FRAME_PAYLOAD_DATA: Self = Self(1007);

    /// Message violates the endpoint's policy.
    pub const POLICY_VIOLATION: Self = Self(1008);

    /// Message too big to process.
    pub const MESSAGE_TOO_BIG: Self = Self(1009);

    /// Client expected the server to negotiate an extension.
    pub const MISSING_EXTENSION: Self = Self(1010);

    /// Server hit an unexpected condition.
    pub const INTERNAL_ERROR: Self = Self(1011);

    /// Server is restarting.
    pub const SERVICE_RESTART: Self = Self(1012);

    /// Temporary server condition; try again later.
    pub const TRY_AGAIN_LATER: Self = Self(1013);

    /// Gateway received an invalid upstream response.
    pub const BAD_GATEWAY: Self = Self(1014);

    /// TLS handshake failed.
    pub const TLS_HANDSHAKE_RESERVED: Self = Self(1015);

    /// Creates a close code from its numeric value.
    #[inline]
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric value.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns `true` for codes that must never appear in a close frame.
    #[inline]
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        matches!(self.0, 1004 | 1005 | 1006 | 1015)
    }
}

impl From<u16> for CloseCode {
    #[inline]
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<CloseCode> for u16 {
    #[inline]
    fn from(code: CloseCode) -> Self {
        code.0
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// CloseEvent
// ============================================================================

/// Close notification passed to close listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseEvent {
    /// Close code.
    pub code: CloseCode,

    /// Human-readable reason (may be empty).
    pub reason: String,
}

impl CloseEvent {
    /// Reason used when the client closes the connection itself.
    pub const CLOSED_BY_CLIENT: &'static str = "Closed by client";

    /// Reason used when the reconnection session gives up.
    pub const RECONNECT_FAILED: &'static str = "Reconnect failed";

    /// Creates a close event.
    #[inline]
    #[must_use]
    pub fn new(code: impl Into<CloseCode>, reason: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            reason: reason.into(),
        }
    }

    /// Default event for a client-initiated disconnect.
    #[inline]
    #[must_use]
    pub fn closed_by_client() -> Self {
        Self::new(CloseCode::NORMAL, Self::CLOSED_BY_CLIENT)
    }

    /// Synthetic event for an exhausted reconnection session.
    #[inline]
    #[must_use]
    pub fn reconnect_failed() -> Self {
        Self::new(CloseCode::NORMAL, Self::RECONNECT_FAILED)
    }

    /// Transport dropped without a close frame.
    #[inline]
    #[must_use]
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(CloseCode::ABNORMAL_CLOSURE_RESERVED, reason)
    }
}

// ============================================================================
// Tests
// ============================================================================
