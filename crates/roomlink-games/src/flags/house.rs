//! House mode: the `host` builds one board and the `player` guesses it.
//!
//! Starting a round moves the entry fee from player to host. Each safe
//! flag found moves the hit score back from host to player. Hitting a
//! mine, or finding every safe flag, ends the round.

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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HouseSeat {
    Host,
    Player,
}

impl HouseSeat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Player => "player",
        }
    }
}

impl fmt::Display for HouseSeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HouseSeat {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(Self::Host),
            "player" => Ok(Self::Player),
            other => Err(Rejection::invalid(format!("unknown house seat {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HousePlayers {
    pub host: SeatPresence,
    pub player: SeatPresence,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseScores {
    pub host: i64,
    pub player: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HouseRoom {
    pub mode: FlagMode,
    pub status: FlagStatus,
    pub entry_fee: u32,
    pub hit_score: u32,
    pub round: u32,
    #[serde(deserialize_with = "roomlink_protocol::deserialize_millis")]
    pub created_at: u64,
    #[serde(deserialize_with = "roomlink_protocol::deserialize_millis")]
    pub last_active: u64,
    /// Human-readable end-of-round message; empty while a round runs.
    pub result: String,
    pub grid_width: u8,
    pub grid_height: u8,
    pub players: HousePlayers,
    pub flags: Vec<Flag>,
    pub guessed: Vec<String>,
    pub scores: HouseScores,
    /// Fields this version does not model; written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for HouseRoom {
    fn default() -> Self {
        let limits = FlagLimits::default();
        Self {
            mode: FlagMode::House,
            status: FlagStatus::Setup,
            entry_fee: limits.default_entry_fee,
            hit_score: limits.default_hit_score,
            round: 1,
            created_at: 0,
            last_active: 0,
            result: String::new(),
            grid_width: limits.default_grid,
            grid_height: limits.default_grid,
            players: HousePlayers::default(),
            flags: Vec::new(),
            guessed: Vec::new(),
            scores: HouseScores::default(),
            extra: Map::new(),
        }
    }
}

impl RoomDocument for HouseRoom {
    fn touch(&mut self, now_millis: u64) {
        self.last_active = now_millis;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HouseIntent {
    /// Resizing clears the board.
    SetGrid { width: u32, height: u32 },
    SetEntryFee(u32),
    SetHitScore(u32),
    Edit(BoardEdit),
    Start,
    Guess { x: u8, y: u8 },
    /// Clears the board and bumps the round. Allowed at any time.
    ResetRound,
}

impl HouseIntent {
    fn name(&self) -> &'static str {
        match self {
            Self::SetGrid { .. } => "resize the grid",
            Self::SetEntryFee(_) => "set the entry fee",
            Self::SetHitScore(_) => "set the hit score",
            Self::Edit(_) => "edit the board",
            Self::Start => "start",
            Self::Guess { .. } => "guess",
            Self::ResetRound => "reset the round",
        }
    }

    fn accepted_in(&self) -> &'static [FlagStatus] {
        use FlagStatus::*;
        match self {
            Self::SetGrid { .. }
            | Self::SetEntryFee(_)
            | Self::SetHitScore(_)
            | Self::Edit(_)
            | Self::Start => &[Setup],
            Self::Guess { .. } => &[Playing],
            Self::ResetRound => &[Setup, Playing, Over],
        }
    }

    /// The seat allowed to send this intent.
    fn sender(&self) -> HouseSeat {
        match self {
            Self::Guess { .. } => HouseSeat::Player,
            _ => HouseSeat::Host,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HouseEngine {
    limits: FlagLimits,
}

impl HouseEngine {
    pub fn new(limits: FlagLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &FlagLimits {
        &self.limits
    }
}

impl TurnEngine for HouseEngine {
    type Seat = HouseSeat;
    type Room = HouseRoom;
    type Setup = ();
    type Intent = HouseIntent;
    type Outcome = FlagOutcome;

    const NAMESPACE: Namespace = FLAG_ROOMS;
    const SEATS: &'static [&'static str] = &["host", "player"];

    /// Either seat may create the room; the other starts vacant.
    fn open(
        &self,
        creator: HouseSeat,
        _setup: (),
        ctx: &mut EngineCtx<'_>,
    ) -> Result<HouseRoom, Rejection> {
        let seat = |s: HouseSeat| SeatPresence {
            left: s != creator,
            joined_at: (s == creator).then_some(ctx.now),
            ..SeatPresence::default()
        };
        Ok(HouseRoom {
            entry_fee: self.limits.default_entry_fee,
            hit_score: self.limits.default_hit_score,
            grid_width: self.limits.default_grid,
            grid_height: self.limits.default_grid,
            created_at: ctx.now,
            last_active: ctx.now,
            players: HousePlayers {
                host: seat(HouseSeat::Host),
                player: seat(HouseSeat::Player),
                extra: Map::new(),
            },
            ..HouseRoom::default()
        })
    }

    fn recognize(raw: &Value) -> Result<(), Rejection> {
        FlagMode::expect(raw, FlagMode::House)
    }

    fn upgrade(raw: &mut Value) {
        default_left(raw, "host", false);
        default_left(raw, "player", true);
    }

    fn apply(
        &self,
        room: &mut HouseRoom,
        seat: HouseSeat,
        intent: &HouseIntent,
        _ctx: &mut EngineCtx<'_>,
    ) -> Result<FlagOutcome, Rejection> {
        require_status(&room.status, intent.accepted_in(), intent.name())?;
        if seat != intent.sender() {
            return Err(Rejection::NotPermitted {
                seat: seat.to_string(),
                action: intent.name(),
            });
        }

        match intent {
            HouseIntent::SetGrid { width, height } => {
                room.grid_width = self.limits.clamp_grid(*width);
                room.grid_height = self.limits.clamp_grid(*height);
                room.flags.clear();
                room.guessed.clear();
                room.result.clear();
                Ok(FlagOutcome::Configured)
            }
            HouseIntent::SetEntryFee(fee) => {
                room.entry_fee = self.limits.clamp_points(*fee);
                Ok(FlagOutcome::Configured)
            }
            HouseIntent::SetHitScore(score) => {
                room.hit_score = self.limits.clamp_points(*score);
                Ok(FlagOutcome::Configured)
            }
            HouseIntent::Edit(edit) => {
                edit_board(
                    &mut room.flags,
                    room.grid_width,
                    room.grid_height,
                    *edit,
                    &self.limits,
                )?;
                Ok(FlagOutcome::Edited)
            }
            HouseIntent::Start => {
                check_playable(&room.flags)?;
                advance(&mut room.status, FlagStatus::Playing)?;
                let fee = i64::from(room.entry_fee);
                room.scores.host += fee;
                room.scores.player -= fee;
                room.guessed.clear();
                room.result.clear();
                Ok(FlagOutcome::Started)
            }
            HouseIntent::Guess { x, y } => {
                let result = guess_flag(&room.flags, &mut room.guessed, *x, *y)?;
                match result {
                    GuessResult::Mine => {
                        advance(&mut room.status, FlagStatus::Over)?;
                        room.result = "Mine hit! Round over.".to_string();
                    }
                    GuessResult::Safe { cleared } => {
                        let score = i64::from(room.hit_score);
                        room.scores.player += score;
                        room.scores.host -= score;
                        if cleared {
                            advance(&mut room.status, FlagStatus::Over)?;
                            room.result = "Every safe flag found. Round over.".to_string();
                        }
                    }
                }
                Ok(FlagOutcome::Guessed(result))
            }
            HouseIntent::ResetRound => {
                advance(&mut room.status, FlagStatus::Setup)?;
                room.flags.clear();
                room.guessed.clear();
                room.result.clear();
                room.round += 1;
                Ok(FlagOutcome::Reset { round: room.round })
            }
        }
    }
}
