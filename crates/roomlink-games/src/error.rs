//! Error types for the game layer.

use roomlink_protocol::{Namespace, ProtocolError, RoomId};
use roomlink_store::StoreError;

/// Why an engine refused an intent.
///
/// A rejection always leaves the room document untouched: it is raised
/// either before any store call (input validation) or inside the
/// transaction, which then aborts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    /// The intent is malformed on its own (wrong digit count, bad
    /// amount, empty text).
    #[error("invalid input: {0}")]
    Invalid(String),

    /// The room's status does not accept this intent.
    #[error("{intent} is not allowed while the room is {status}")]
    WrongStatus { status: String, intent: &'static str },

    /// The status change the intent would cause is not in the table.
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    /// Only the seat whose turn it is may act.
    #[error("not your turn")]
    NotYourTurn,

    /// The seat may never do this (e.g. a guest configuring the room).
    #[error("seat {seat} may not {action}")]
    NotPermitted { seat: String, action: &'static str },

    /// The target was already guessed this round.
    #[error("{0} was already guessed")]
    AlreadyGuessed(String),

    /// The room belongs to another game mode.
    #[error("room is in {actual} mode, not {expected}")]
    WrongMode { expected: &'static str, actual: String },

    #[error("not enough cash: need {need:.2}, have {have:.2}")]
    InsufficientFunds { need: f64, have: f64 },

    /// A game rule blocks the intent right now (table full, no mines
    /// placed, trading suspended, ...).
    #[error("{0}")]
    Unmet(String),
}

impl Rejection {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub(crate) fn unmet(msg: impl Into<String>) -> Self {
        Self::Unmet(msg.into())
    }
}

/// Errors returned by [`EngineRunner`](crate::EngineRunner).
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),

    /// The room is gone (deleted by cleanup or the sweep).
    #[error("room {room_id} not found in {namespace}")]
    RoomNotFound { namespace: Namespace, room_id: RoomId },

    /// The transaction ended without committing and without a verdict
    /// from the engine.
    #[error("room {room_id} update did not commit")]
    NotCommitted { room_id: RoomId },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl GameError {
    /// The rejection, if the engine refused the intent.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_display() {
        let r = Rejection::WrongStatus {
            status: "playing".into(),
            intent: "set digits",
        };
        assert_eq!(r.to_string(), "set digits is not allowed while the room is playing");
        assert_eq!(
            Rejection::InsufficientFunds { need: 10.0, have: 2.5 }.to_string(),
            "not enough cash: need 10.00, have 2.50"
        );
    }

    #[test]
    fn test_from_rejection() {
        let err: GameError = Rejection::NotYourTurn.into();
        assert_eq!(err.rejection(), Some(&Rejection::NotYourTurn));
        assert!(err.to_string().contains("not your turn"));
    }
}
