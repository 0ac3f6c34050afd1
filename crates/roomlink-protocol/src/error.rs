//! Error types for the protocol layer.
//!
//! Each crate in Roomlink defines its own error enum. A `ProtocolError`
//! always means the problem is in identifiers, paths, or document
//! (de)serialization, never in the store or in game rules.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing a typed document into a JSON value failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// A JSON value could not be read as the expected document type.
    ///
    /// Missing fields never cause this (documents decode with
    /// defaults); wrong types do, e.g. a string where a number belongs.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// A room identifier was not a 4-digit number in `1000..=9999`.
    #[error("invalid room id: {0:?}")]
    InvalidRoomId(String),

    /// A document path contained an empty or forbidden segment.
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
}
