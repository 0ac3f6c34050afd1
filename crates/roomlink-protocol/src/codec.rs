//! Codec trait for converting typed room documents to and from the
//! store's JSON values.
//!
//! The store only understands `serde_json::Value`. Games work with typed
//! structs. The codec sits at that boundary, and it is also where legacy
//! or partially-written documents are normalized: room document types
//! derive `#[serde(default)]`, so a missing field decodes to its
//! documented default instead of failing.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::ProtocolError;

/// Encodes typed values into document values and decodes them back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a document value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the type can't be represented
    /// (e.g. a map with non-string keys).
    fn encode<T: Serialize>(&self, value: &T) -> Result<Value, ProtocolError>;

    /// Deserializes a document value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if a present field has the wrong
    /// shape.
    fn decode<T: DeserializeOwned>(&self, value: &Value) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// The default [`Codec`], backed by `serde_json`.
///
/// ```rust
/// use roomlink_protocol::{Codec, JsonCodec, RoomMeta};
///
/// let codec = JsonCodec;
/// // An old document with no `players` map and no timestamps.
/// let meta: RoomMeta = codec.decode(&serde_json::json!({ "status": "over" })).unwrap();
/// assert_eq!(meta.status, "over");
/// assert!(meta.players.is_empty());
/// assert_eq!(meta.last_touched(), None);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Value, ProtocolError> {
        serde_json::to_value(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, value: &Value) -> Result<T, ProtocolError> {
        T::deserialize(value).map_err(ProtocolError::Decode)
    }
}
