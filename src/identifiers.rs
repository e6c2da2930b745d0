//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing listener tokens with transport
//! generations at compile time.
//!
//! | Type | Identifies |
//! |------|------------|
//! | [`ListenerId`] | One listener registration |
//! | [`TransportId`] | One transport attempt (generation) |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// ListenerId
// ============================================================================

/// Registration token for a listener.
///
/// Unique per process. Removal goes by token, never by callback identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generates a fresh listener ID.
    #[must_use]
    pub fn generate() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

// ============================================================================
// TransportId
// ============================================================================

/// Generation number of a transport attempt.
///
/// Every call that creates a transport takes the next generation, so
/// events from a replaced transport can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TransportId(u64);

impl TransportId {
    /// Creates a transport ID from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the following generation.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_ids_unique() {
        let a = ListenerId::generate();
        let b = ListenerId::generate();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_transport_id_next() {
        let id = TransportId::default();
        assert_eq!(id.next(), TransportId::new(1));
        assert_eq!(id.next().to_string(), "#1");
    }
}
