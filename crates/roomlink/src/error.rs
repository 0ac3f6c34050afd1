//! Unified error type for the Roomlink facade.

use roomlink_games::GameError;
use roomlink_presence::PresenceError;
use roomlink_protocol::{Namespace, ProtocolError, RoomId};
use roomlink_room::RoomError;
use roomlink_store::StoreError;

/// Top-level error returned by [`Lobby`](crate::Lobby) and
/// [`Table`](crate::Table).
#[derive(Debug, thiserror::Error)]
pub enum RoomlinkError {
    /// No room with this id exists in the namespace.
    #[error("room {room_id} not found in {namespace}")]
    RoomNotFound { namespace: Namespace, room_id: RoomId },

    /// Someone live already holds the seat.
    #[error("seat {seat} in room {room_id} is taken")]
    SeatTaken { room_id: RoomId, seat: String },

    /// Room allocation or seat bookkeeping failed.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Presence attach or cleanup failed.
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// A game engine refused an intent, or its transaction failed.
    #[error(transparent)]
    Game(#[from] GameError),

    /// The document store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A document or id did not decode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl RoomlinkError {
    /// `true` if a game engine refused the intent. Nothing was written.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Game(GameError::Rejected(_)))
    }
}
