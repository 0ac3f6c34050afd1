//! PK mode: seats `A` and `B` each build a private field and confirm
//! it. Once both have confirmed, play starts with `A` on turn and the
//! sides alternate guessing flags on the opponent's field.

use std::fmt;
use std::str::FromStr;

use roomlink_protocol::{Namespace, SeatPresence};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{
    BoardEdit, FLAG_ROOMS, Flag, FlagLimits, FlagMode, FlagOutcome, GuessResult, check_playable,
    default_left, edit_board, guess_flag,
};
use crate::engine::require_status;
use crate::status::{FlagStatus, advance};
use crate::{EngineCtx, Rejection, RoomDocument, TurnEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PkSeat {
    #[default]
    A,
    B,
}

impl PkSeat {
    pub fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl fmt::Display for PkSeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PkSeat {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            other => Err(Rejection::invalid(format!("unknown pk seat {other:?}"))),
        }
    }
}

/// One value per side, stored as `{ "A": .., "B": .. }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct PkPair<T> {
    #[serde(rename = "A")]
    pub a: T,
    #[serde(rename = "B")]
    pub b: T,
}

impl<T> PkPair<T> {
    pub fn get(&self, seat: PkSeat) -> &T {
        match seat {
            PkSeat::A => &self.a,
            PkSeat::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, seat: PkSeat) -> &mut T {
        match seat {
            PkSeat::A => &mut self.a,
            PkSeat::B => &mut self.b,
        }
    }
}

/// One side's private board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PkField {
    pub grid_width: u8,
    pub grid_height: u8,
    pub flags: Vec<Flag>,
    pub confirmed: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PkField {
    fn default() -> Self {
        let grid = FlagLimits::default().default_grid;
        Self {
            grid_width: grid,
            grid_height: grid,
            flags: Vec::new(),
            confirmed: false,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PkRoom {
    pub mode: FlagMode,
    pub status: FlagStatus,
    pub entry_fee: u32,
    pub hit_score: u32,
    pub round: u32,
    #[serde(deserialize_with = "roomlink_protocol::deserialize_millis")]
    pub created_at: u64,
    #[serde(deserialize_with = "roomlink_protocol::deserialize_millis")]
    pub last_active: u64,
    pub result: String,
    pub turn: PkSeat,
    pub players: PkPair<SeatPresence>,
    pub fields: PkPair<PkField>,
    /// Flags each side has guessed on the other's field.
    pub guessed: PkPair<Vec<String>>,
    pub scores: PkPair<i64>,
    /// Fields this version does not model; written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PkRoom {
    fn default() -> Self {
        let limits = FlagLimits::default();
        Self {
            mode: FlagMode::Pk,
            status: FlagStatus::Setup,
            entry_fee: limits.default_entry_fee,
            hit_score: limits.default_hit_score,
            round: 1,
            created_at: 0,
            last_active: 0,
            result: String::new(),
            turn: PkSeat::A,
            players: PkPair::default(),
            fields: PkPair::default(),
            guessed: PkPair::default(),
            scores: PkPair::default(),
            extra: Map::new(),
        }
    }
}

impl RoomDocument for PkRoom {
    fn touch(&mut self, now_millis: u64) {
        self.last_active = now_millis;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PkIntent {
    /// Resizes the sender's own field and clears it.
    SetGrid { width: u32, height: u32 },
    SetEntryFee(u32),
    SetHitScore(u32),
    Edit(BoardEdit),
    Confirm,
    /// Clears the sender's field and withdraws its confirmation.
    ResetField,
    Guess { x: u8, y: u8 },
    /// Back to setup with both fields unconfirmed (flags are kept).
    ResetRound,
}

impl PkIntent {
    fn name(&self) -> &'static str {
        match self {
            Self::SetGrid { .. } => "resize the field",
            Self::SetEntryFee(_) => "set the entry fee",
            Self::SetHitScore(_) => "set the hit score",
            Self::Edit(_) => "edit the field",
            Self::Confirm => "confirm the field",
            Self::ResetField => "reset the field",
            Self::Guess { .. } => "guess",
            Self::ResetRound => "reset the round",
        }
    }

    fn accepted_in(&self) -> &'static [FlagStatus] {
        use FlagStatus::*;
        match self {
            Self::Guess { .. } => &[Playing],
            Self::ResetRound => &[Setup, Playing, Over],
            _ => &[Setup],
        }
    }

    /// Edits that are frozen once the sender has confirmed.
    fn edits_field(&self) -> bool {
        matches!(self, Self::SetGrid { .. } | Self::Edit(_) | Self::Confirm)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PkEngine {
    limits: FlagLimits,
}

impl PkEngine {
    pub fn new(limits: FlagLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &FlagLimits {
        &self.limits
    }
}

impl TurnEngine for PkEngine {
    type Seat = PkSeat;
    type Room = PkRoom;
    type Setup = ();
    type Intent = PkIntent;
    type Outcome = FlagOutcome;

    const NAMESPACE: Namespace = FLAG_ROOMS;
    const SEATS: &'static [&'static str] = &["A", "B"];

    fn open(&self, creator: PkSeat, _setup: (), ctx: &mut EngineCtx<'_>) -> Result<PkRoom, Rejection> {
        let seat = |s: PkSeat| SeatPresence {
            left: s != creator,
            joined_at: (s == creator).then_some(ctx.now),
            ..SeatPresence::default()
        };
        let field = PkField {
            grid_width: self.limits.default_grid,
            grid_height: self.limits.default_grid,
            ..PkField::default()
        };
        Ok(PkRoom {
            entry_fee: self.limits.default_entry_fee,
            hit_score: self.limits.default_hit_score,
            created_at: ctx.now,
            last_active: ctx.now,
            players: PkPair {
                a: seat(PkSeat::A),
                b: seat(PkSeat::B),
            },
            fields: PkPair {
                a: field.clone(),
                b: field,
            },
            ..PkRoom::default()
        })
    }

    fn recognize(raw: &Value) -> Result<(), Rejection> {
        FlagMode::expect(raw, FlagMode::Pk)
    }

    fn upgrade(raw: &mut Value) {
        default_left(raw, "A", false);
        default_left(raw, "B", true);
    }

    fn apply(
        &self,
        room: &mut PkRoom,
        seat: PkSeat,
        intent: &PkIntent,
        _ctx: &mut EngineCtx<'_>,
    ) -> Result<FlagOutcome, Rejection> {
        require_status(&room.status, intent.accepted_in(), intent.name())?;
        if intent.edits_field() && room.fields.get(seat).confirmed {
            return Err(Rejection::unmet("field already confirmed"));
        }

        match intent {
            PkIntent::SetGrid { width, height } => {
                let field = room.fields.get_mut(seat);
                field.grid_width = self.limits.clamp_grid(*width);
                field.grid_height = self.limits.clamp_grid(*height);
                field.flags.clear();
                field.confirmed = false;
                Ok(FlagOutcome::Configured)
            }
            PkIntent::SetEntryFee(fee) => {
                room.entry_fee = self.limits.clamp_points(*fee);
                Ok(FlagOutcome::Configured)
            }
            PkIntent::SetHitScore(score) => {
                room.hit_score = self.limits.clamp_points(*score);
                Ok(FlagOutcome::Configured)
            }
            PkIntent::Edit(edit) => {
                let field = room.fields.get_mut(seat);
                edit_board(
                    &mut field.flags,
                    field.grid_width,
                    field.grid_height,
                    *edit,
                    &self.limits,
                )?;
                Ok(FlagOutcome::Edited)
            }
            PkIntent::Confirm => {
                check_playable(&room.fields.get(seat).flags)?;
                room.fields.get_mut(seat).confirmed = true;
                let started = room.fields.a.confirmed && room.fields.b.confirmed;
                if started {
                    advance(&mut room.status, FlagStatus::Playing)?;
                    room.guessed = PkPair::default();
                    room.result.clear();
                    room.turn = PkSeat::A;
                }
                Ok(FlagOutcome::Confirmed { started })
            }
            PkIntent::ResetField => {
                let field = room.fields.get_mut(seat);
                field.flags.clear();
                field.confirmed = false;
                Ok(FlagOutcome::Edited)
            }
            PkIntent::Guess { x, y } => {
                if room.turn != seat {
                    return Err(Rejection::NotYourTurn);
                }
                let opponent = seat.opponent();
                let result = guess_flag(
                    &room.fields.get(opponent).flags,
                    room.guessed.get_mut(seat),
                    *x,
                    *y,
                )?;
                match result {
                    GuessResult::Mine => {
                        advance(&mut room.status, FlagStatus::Over)?;
                        room.result = format!("{seat} hit a mine, {opponent} wins.");
                    }
                    GuessResult::Safe { cleared } => {
                        let score = i64::from(room.hit_score);
                        *room.scores.get_mut(seat) += score;
                        *room.scores.get_mut(opponent) -= score;
                        if cleared {
                            advance(&mut room.status, FlagStatus::Over)?;
                            room.result = format!("{seat} found every safe flag. Round over.");
                        } else {
                            room.turn = opponent;
                        }
                    }
                }
                Ok(FlagOutcome::Guessed(result))
            }
            PkIntent::ResetRound => {
                advance(&mut room.status, FlagStatus::Setup)?;
                room.round += 1;
                room.result.clear();
                room.turn = PkSeat::A;
                room.guessed = PkPair::default();
                room.fields.a.confirmed = false;
                room.fields.b.confirmed = false;
                Ok(FlagOutcome::Reset { round: room.round })
            }
        }
    }
}
