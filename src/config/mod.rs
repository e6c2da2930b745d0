//! Connection configuration.
//!
//! A [`ConnectionConfig`] is validated once when built and never mutated
//! afterwards. Use [`ConnectionConfig::builder`] in code or
//! [`ConnectionConfig::from_json`] to load it from a document.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use ws_reconnect::{ConnectionConfig, ReconnectConfig};
//!
//! let config = ConnectionConfig::builder("ws://127.0.0.1:8080")
//!     .debug(true)
//!     .reconnect(ReconnectConfig::new(Duration::from_millis(500), 4))
//!     .build()?;
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent builder with validation |
//! | `reconnect` | Backoff policy |

// ============================================================================
// Submodules
// ============================================================================

/// Builder for [`ConnectionConfig`].
pub mod builder;

/// Reconnection policy.
pub mod reconnect;

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use url::Url;

use crate::error::Result;

pub use builder::ConnectionConfigBuilder;
pub use reconnect::{DelayIncrease, ReconnectConfig};

// ============================================================================
// Constants
// ============================================================================

/// URL schemes a connection may target.
pub const SUPPORTED_SCHEMES: &[&str] = &["ws", "wss", "http", "https"];

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Immutable, validated connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    url: Url,
    debug: bool,
    reconnect: Option<ReconnectConfig>,
}

impl ConnectionConfig {
    /// Starts a builder for the given endpoint URL.
    #[inline]
    #[must_use]
    pub fn builder(url: impl Into<String>) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new(url)
    }

    /// Loads and validates a configuration from JSON.
    ///
    /// ```json
    /// {
    ///   "url": "ws://127.0.0.1:8080",
    ///   "debug": true,
    ///   "reconnect": { "delay": 500, "delayIncreaseType": "doubling", "attempts": 4 }
    /// }
    /// ```
    ///
    /// `reconnect` may also be `false` (disabled) or `true` (default policy).
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Json`] if the document is malformed
    /// - [`crate::Error::InvalidUrl`] / [`crate::Error::Config`] if validation fails
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)?;

        let mut builder = Self::builder(raw.url).debug(raw.debug);
        match raw.reconnect {
            RawReconnect::Enabled(false) => {}
            RawReconnect::Enabled(true) => builder = builder.reconnect(ReconnectConfig::default()),
            RawReconnect::Policy(policy) => builder = builder.reconnect(policy),
        }

        builder.build()
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns `true` if lifecycle logs are promoted to `info`.
    #[inline]
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Returns the reconnection policy, if enabled.
    #[inline]
    #[must_use]
    pub fn reconnect(&self) -> Option<&ReconnectConfig> {
        self.reconnect.as_ref()
    }
}

// ============================================================================
// Raw Document
// ============================================================================

#[derive(Deserialize)]
struct RawConfig {
    url: String,
    #[serde(default)]
    debug: bool,
    #[serde(default)]
    reconnect: RawReconnect,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawReconnect {
    Enabled(bool),
    Policy(ReconnectConfig),
}

impl Default for RawReconnect {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

// ============================================================================
// Tests
// ============================================================================
