//! Message-level types shared by the connection and the transport.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `close` | Close codes and close events |
//! | `frame` | Serialized frame representation |
//! | `serializer` | Pluggable encode/decode, JSON default |

// ============================================================================
// Submodules
// ============================================================================

/// Close codes and close events.
pub mod close;

/// Serialized frame representation.
pub mod frame;

/// Serializer trait and JSON implementation.
pub mod serializer;

// ============================================================================
// Re-exports
// ============================================================================

pub use close::{CloseCode, CloseEvent};
pub use frame::Frame;
pub use serializer::{JsonSerializer, Serializer};
