//! Error types for the room layer.

use roomlink_protocol::{Namespace, ProtocolError, RoomId};
use roomlink_store::StoreError;

/// Errors that can occur during directory and seat operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Every counter draw landed on an id that is in use (or lost its
    /// transaction). The caller should fail the "create room" action.
    #[error("no free room id in {namespace} after {attempts} attempts")]
    AllocationExhausted { namespace: Namespace, attempts: u32 },

    /// The room does not exist (never created, or already cleaned up).
    #[error("room {room_id} not found in {namespace}")]
    NotFound { namespace: Namespace, room_id: RoomId },

    /// Seat payloads and patches must be JSON objects.
    #[error("payload for seat {seat} must be a JSON object")]
    InvalidSeatPayload { seat: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
