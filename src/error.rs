//! Error types for the connection manager.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use ws_reconnect::{ConnectionConfig, Result};
//!
//! fn config() -> Result<ConnectionConfig> {
//!     ConnectionConfig::builder("ws://127.0.0.1:8080").debug(true).build()
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidUrl`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::NotReady`] |
//! | Serialization | [`Error::Serialize`], [`Error::Deserialize`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::connection::Status;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when connection or reconnect configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// URL is not a usable WebSocket endpoint.
    #[error("Not valid WebSocket URL: {url}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport failed.
    ///
    /// Not produced by [`crate::WsConnector`]; returned by custom
    /// [`crate::TransportHandle`] implementations from `send`.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Transport is already closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Payload cannot be sent in the current status.
    #[error("Cannot send while {status}")]
    NotReady {
        /// Status at the time of the send.
        status: Status,
    },

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// Outbound payload could not be encoded.
    ///
    /// [`crate::JsonSerializer`] reports [`Error::Json`] instead; this variant
    /// is for custom [`crate::Serializer`] implementations.
    #[error("Serialize failed: {message}")]
    Serialize {
        /// Description of the encoding failure.
        message: String,
    },

    /// Inbound frame could not be decoded.
    #[error("Deserialize failed for data: {message}")]
    Deserialize {
        /// Description of the decoding failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a not-ready error.
    #[inline]
    pub fn not_ready(status: Status) -> Self {
        Self::NotReady { status }
    }

    /// Creates a serialize error.
    #[inline]
    pub fn serialize(message: impl Into<String>) -> Self {
        Self::Serialize {
            message: message.into(),
        }
    }

    /// Creates a deserialize error.
    #[inline]
    pub fn deserialize(message: impl Into<String>) -> Self {
        Self::Deserialize {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a configuration error.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::InvalidUrl { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::NotReady { .. } | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a serialization error.
    #[inline]
    #[must_use]
    pub fn is_serialization_error(&self) -> bool {
        matches!(
            self,
            Self::Serialize { .. } | Self::Deserialize { .. } | Self::Json(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_invalid_url_display() {
        let err = Error::invalid_url("ftp://example.com");
        assert_eq!(err.to_string(), "Not valid WebSocket URL: ftp://example.com");
    }

    #[test]
    fn test_not_ready_display() {
        let err = Error::not_ready(Status::Closed);
        assert_eq!(err.to_string(), "Cannot send while closed");
    }

    #[test]
    fn test_predicates() {
        assert!(Error::config("x").is_config_error());
        assert!(Error::invalid_url("x").is_config_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::not_ready(Status::Closed).is_connection_error());
        assert!(Error::deserialize("x").is_serialization_error());
        assert!(!Error::config("x").is_connection_error());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.is_serialization_error());
    }
}
