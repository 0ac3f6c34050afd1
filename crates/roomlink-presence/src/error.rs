//! Error types for the presence layer.

use roomlink_protocol::ProtocolError;
use roomlink_store::StoreError;

/// Errors that can occur during presence and liveness operations.
///
/// Heartbeats never return these; they log and carry on.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// Online/offline patches must be JSON objects.
    #[error("presence patch for seat {seat} must be a JSON object")]
    InvalidPatch { seat: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
