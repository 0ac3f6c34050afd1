//! The `TurnEngine` trait: one implementation per game.
//!
//! An engine is pure game rules. It never talks to the store: the
//! [`EngineRunner`](crate::EngineRunner) reads the room document, hands
//! it to [`TurnEngine::apply`] inside a transaction, and commits whatever
//! the engine left behind. Because `apply` only mutates the value it is
//! given, a retried transaction simply calls it again on fresh data.

use std::fmt;

use rand::rngs::StdRng;
use roomlink_protocol::Namespace;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::Rejection;

/// Per-call context handed to the engine.
///
/// Engines must take the time and all randomness from here so that
/// tests can pin both.
pub struct EngineCtx<'a> {
    /// Epoch millis at the start of the submission.
    pub now: u64,
    pub rng: &'a mut StdRng,
}

impl<'a> EngineCtx<'a> {
    pub fn new(now: u64, rng: &'a mut StdRng) -> Self {
        Self { now, rng }
    }
}

/// A typed room document.
///
/// Implementors derive `#[serde(default)]` so legacy documents with
/// missing fields decode to documented defaults.
pub trait RoomDocument: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Records activity at `now_millis` (the `lastActive` field).
    fn touch(&mut self, now_millis: u64);
}

/// Game rules for one game type.
///
/// The associated types define the shape of the game:
/// - `Seat`: the seat labels (`A`/`B`, `host`/`player`, `P1..P8`)
/// - `Room`: the whole room document
/// - `Setup`: what the creator chooses before the room exists
/// - `Intent`: what a seat can ask for
/// - `Outcome`: what the seat learns when its intent commits
pub trait TurnEngine: Send + Sync + 'static {
    type Seat: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static;
    type Room: RoomDocument;
    type Setup: Send;
    type Intent: fmt::Debug + Send + Sync;
    type Outcome: fmt::Debug + Send;

    /// Collection the game keeps its rooms in.
    const NAMESPACE: Namespace;

    /// Every seat label the game can ever use. Seats missing from a
    /// document count as vacant.
    const SEATS: &'static [&'static str];

    /// Builds the initial document for a room created by `host`.
    fn open(
        &self,
        host: Self::Seat,
        setup: Self::Setup,
        ctx: &mut EngineCtx<'_>,
    ) -> Result<Self::Room, Rejection>;

    /// Checks that a raw document belongs to this engine at all (for
    /// games that share a namespace between modes).
    fn recognize(_raw: &Value) -> Result<(), Rejection> {
        Ok(())
    }

    /// Rewrites a raw document before it is decoded. Used where a
    /// missing field's default depends on context the type can't see.
    fn upgrade(_raw: &mut Value) {}

    /// Seat entry written when a guest claims `seat`. The claim itself
    /// forces `left: false`.
    fn seat_payload(&self, _seat: Self::Seat, now: u64) -> Value {
        json!({ "joinedAt": now })
    }

    /// Extra fields scrubbed when `seat` goes offline or leaves, on top
    /// of `left: true`.
    fn offline_patch(&self, _seat: Self::Seat) -> Value {
        json!({})
    }

    /// Stateless validation, run before any store call.
    fn precheck(&self, _intent: &Self::Intent) -> Result<(), Rejection> {
        Ok(())
    }

    /// Applies `intent` from `seat` to the room.
    ///
    /// On `Err` the caller discards `room`; implementations may leave it
    /// half-modified.
    fn apply(
        &self,
        room: &mut Self::Room,
        seat: Self::Seat,
        intent: &Self::Intent,
        ctx: &mut EngineCtx<'_>,
    ) -> Result<Self::Outcome, Rejection>;

    /// Finishes work a vacated seat was holding up, such as a round
    /// still waiting on that seat. Run after a seat is released while
    /// others remain. `None` when there is nothing to do.
    fn settle(
        &self,
        _room: &mut Self::Room,
        _ctx: &mut EngineCtx<'_>,
    ) -> Result<Option<Self::Outcome>, Rejection> {
        Ok(None)
    }
}

/// Guard shared by every engine: `status` must be one of `allowed`.
pub(crate) fn require_status<S: PartialEq + fmt::Display>(
    status: &S,
    allowed: &[S],
    intent: &'static str,
) -> Result<(), Rejection> {
    if allowed.contains(status) {
        Ok(())
    } else {
        Err(Rejection::WrongStatus {
            status: status.to_string(),
            intent,
        })
    }
}
