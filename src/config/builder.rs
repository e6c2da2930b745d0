//! Builder pattern for connection configuration.
//!
//! # Example
//!
//! ```ignore
//! use ws_reconnect::ConnectionConfig;
//!
//! let config = ConnectionConfig::builder("ws://127.0.0.1:8080").build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};

use super::{ConnectionConfig, ReconnectConfig, SUPPORTED_SCHEMES};

// ============================================================================
// ConnectionConfigBuilder
// ============================================================================

/// Builder for a [`ConnectionConfig`].
///
/// Use [`ConnectionConfig::builder()`] to create a new builder.
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    /// Endpoint URL, unparsed.
    url: String,
    /// Promote lifecycle logs to `info`.
    debug: bool,
    /// Reconnection policy.
    reconnect: Option<ReconnectConfig>,
}

// ============================================================================
// ConnectionConfigBuilder Implementation
// ============================================================================

impl ConnectionConfigBuilder {
    /// Creates a builder targeting `url` with reconnection disabled.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            debug: false,
            reconnect: None,
        }
    }

    /// Promotes lifecycle logs (open, reopen, error, stop) to `info`.
    #[inline]
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enables automatic reconnection with the given policy.
    #[inline]
    #[must_use]
    pub fn reconnect(mut self, policy: ReconnectConfig) -> Self {
        self.reconnect = Some(policy);
        self
    }

    /// Disables automatic reconnection.
    #[inline]
    #[must_use]
    pub fn no_reconnect(mut self) -> Self {
        self.reconnect = None;
        self
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the URL does not parse or its scheme is not
    ///   one of `ws`, `wss`, `http`, `https`
    /// - [`Error::Config`] if the reconnect policy is invalid
    pub fn build(self) -> Result<ConnectionConfig> {
        let url = self.validate_url()?;

        if let Some(policy) = &self.reconnect {
            policy.validate()?;
        }

        Ok(ConnectionConfig {
            url,
            debug: self.debug,
            reconnect: self.reconnect,
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionConfigBuilder {
    /// Parses the URL and checks its scheme.
    fn validate_url(&self) -> Result<Url> {
        let url = Url::parse(&self.url).map_err(|_| Error::invalid_url(&self.url))?;

        if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
            return Err(Error::invalid_url(&self.url));
        }

        Ok(url)
    }
}

// ============================================================================
// Tests
// ============================================================================
