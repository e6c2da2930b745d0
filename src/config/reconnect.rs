//! Reconnection policy.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use ws_reconnect::{CloseCode, DelayIncrease, ReconnectConfig};
//!
//! let policy = ReconnectConfig::new(Duration::from_millis(500), 4)
//!     .with_delay_increase(DelayIncrease::Doubling)
//!     .with_skip_close_codes([CloseCode::NORMAL]);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::CloseCode;

// ============================================================================
// Constants
// ============================================================================

/// Default delay before the first reconnection attempt.
const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Default attempt ceiling.
const DEFAULT_ATTEMPTS: u32 = 5;

// ============================================================================
// DelayIncrease
// ============================================================================

/// How the delay evolves between consecutive attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayIncrease {
    /// Same delay for every attempt.
    #[default]
    #[serde(alias = "default")]
    Constant,
    /// Delay doubles after every attempt.
    #[serde(alias = "twice")]
    Doubling,
}

impl DelayIncrease {
    /// Applies the growth policy to a delay.
    #[inline]
    #[must_use]
    pub fn apply(self, delay: Duration) -> Duration {
        match self {
            Self::Constant => delay,
            Self::Doubling => delay.saturating_mul(2),
        }
    }
}

// ============================================================================
// ReconnectConfig
// ============================================================================

/// Bounded backoff policy for automatic reconnection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectConfig {
    /// Delay before the first attempt.
    #[serde(with = "duration_ms")]
    pub delay: Duration,

    /// Delay growth policy.
    #[serde(rename = "delayIncreaseType", default)]
    pub delay_increase: DelayIncrease,

    /// Attempt ceiling; reaching it ends the session.
    pub attempts: u32,

    /// Close codes that never trigger reconnection.
    #[serde(rename = "skipCloseEventCodes", default)]
    pub skip_close_codes: Vec<CloseCode>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY, DEFAULT_ATTEMPTS)
    }
}

impl ReconnectConfig {
    /// Creates a constant-delay policy with no skipped close codes.
    #[inline]
    #[must_use]
    pub fn new(delay: Duration, attempts: u32) -> Self {
        Self {
            delay,
            delay_increase: DelayIncrease::Constant,
            attempts,
            skip_close_codes: Vec::new(),
        }
    }

    /// Sets the delay growth policy.
    #[inline]
    #[must_use]
    pub fn with_delay_increase(mut self, delay_increase: DelayIncrease) -> Self {
        self.delay_increase = delay_increase;
        self
    }

    /// Sets the close codes excluded from reconnection.
    #[must_use]
    pub fn with_skip_close_codes<I, C>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<CloseCode>,
    {
        self.skip_close_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Checks the policy for values that can never produce a retry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `attempts` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.attempts == 0 {
            return Err(Error::config("reconnect attempts must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Serde Helpers
// ============================================================================

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================
