//! Pluggable payload encoding.
//!
//! A [`Serializer`] turns outbound values into [`Frame`]s and inbound frames
//! back into values. Each connection owns exactly one serializer.
//!
//! # Example
//!
//! ```ignore
//! use ws_reconnect::{Frame, JsonSerializer, Serializer};
//!
//! let serializer = JsonSerializer::<serde_json::Value>::new();
//! let frame = serializer.serialize(&serde_json::json!({ "id": 1 }))?;
//! assert_eq!(frame, Frame::Text(r#"{"id":1}"#.into()));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

use super::Frame;

// ============================================================================
// Serializer
// ============================================================================

/// Encode/decode capability used by a connection.
pub trait Serializer: Send + Sync + 'static {
    /// Value type accepted by `send`.
    type Outbound: Send + 'static;

    /// Value type delivered to message listeners.
    type Inbound: Send + Sync + 'static;

    /// Encodes an outbound value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialize`] or [`Error::Json`] when the value cannot
    /// be encoded.
    fn serialize(&self, value: &Self::Outbound) -> Result<Frame>;

    /// Decodes an inbound frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Deserialize`] or [`Error::Json`] when the frame is
    /// not a valid encoding.
    fn deserialize(&self, frame: Frame) -> Result<Self::Inbound>;
}

// ============================================================================
// JsonSerializer
// ============================================================================

/// JSON serializer over text frames.
///
/// Binary frames are rejected with [`Error::Deserialize`].
pub struct JsonSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSerializer<T> {
    /// Creates a JSON serializer.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonSerializer<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonSerializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSerializer").finish()
    }
}

impl<T> Serializer for JsonSerializer<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Outbound = T;
    type Inbound = T;

    fn serialize(&self, value: &T) -> Result<Frame> {
        Ok(Frame::Text(serde_json::to_string(value)?))
    }

    fn deserialize(&self, frame: Frame) -> Result<T> {
        match frame {
            Frame::Text(text) => Ok(serde_json::from_str(&text)?),
            Frame::Binary(bytes) => Err(Error::deserialize(format!(
                "binary frame of {} bytes",
                bytes.len()
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
