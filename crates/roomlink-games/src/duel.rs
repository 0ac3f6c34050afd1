//! The guess duel: two seats each pick a secret digit string and take
//! turns guessing the other's. A guess scores one hit per digit in the
//! right position; the first full match wins the round.
//!
//! Seat `A` creates the room and is the host: only it configures the
//! digit count and the starting seat, and only it starts a round.

use std::fmt;
use std::str::FromStr;

use roomlink_protocol::Namespace;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::engine::require_status;
use crate::status::{DuelStatus, advance};
use crate::{EngineCtx, Rejection, RoomDocument, TurnEngine};

/// Collection the duel keeps its rooms in.
pub const DUEL_ROOMS: Namespace = Namespace::from_static("rooms");

// ---------------------------------------------------------------------------
// Seats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DuelSeat {
    #[default]
    A,
    B,
}

impl DuelSeat {
    pub fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub fn is_host(self) -> bool {
        self == Self::A
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl fmt::Display for DuelSeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuelSeat {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            other => Err(Rejection::invalid(format!("unknown duel seat {other:?}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// One seat's entry. A missing entry is a seat nobody holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DuelPlayer {
    pub secret: String,
    pub left: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<u64>,
    /// Fields this version does not model; written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for DuelPlayer {
    fn default() -> Self {
        Self {
            secret: String::new(),
            left: true,
            joined_at: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuelPlayers {
    #[serde(rename = "A")]
    pub a: DuelPlayer,
    #[serde(rename = "B")]
    pub b: DuelPlayer,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DuelPlayers {
    pub fn get(&self, seat: DuelSeat) -> &DuelPlayer {
        match seat {
            DuelSeat::A => &self.a,
            DuelSeat::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, seat: DuelSeat) -> &mut DuelPlayer {
        match seat {
            DuelSeat::A => &mut self.a,
            DuelSeat::B => &mut self.b,
        }
    }
}

/// One guess in the history. Kept until the next restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessRecord {
    pub by: DuelSeat,
    pub guess: String,
    pub hits: u8,
    pub at: u64,
    pub round: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DuelRoom {
    pub status: DuelStatus,
    pub digits: u8,
    pub starter: DuelSeat,
    #[serde(with = "crate::blank")]
    pub turn: Option<DuelSeat>,
    #[serde(with = "crate::blank")]
    pub winner: Option<DuelSeat>,
    pub round: u32,
    #[serde(deserialize_with = "roomlink_protocol::deserialize_millis")]
    pub created_at: u64,
    #[serde(deserialize_with = "roomlink_protocol::deserialize_millis")]
    pub last_active: u64,
    pub players: DuelPlayers,
    pub guesses: Vec<GuessRecord>,
    /// Fields this version does not model; written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for DuelRoom {
    fn default() -> Self {
        Self {
            status: DuelStatus::Configuring,
            digits: DuelSettings::default().default_digits,
            starter: DuelSeat::A,
            turn: None,
            winner: None,
            round: 1,
            created_at: 0,
            last_active: 0,
            players: DuelPlayers::default(),
            guesses: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl RoomDocument for DuelRoom {
    fn touch(&mut self, now_millis: u64) {
        self.last_active = now_millis;
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Number of positions where `secret` and `guess` carry the same digit.
///
/// Symmetric in its arguments; `hits(s, s) == s.len()`.
pub fn hits(secret: &str, guess: &str) -> u8 {
    secret
        .bytes()
        .zip(guess.bytes())
        .filter(|(s, g)| s == g)
        .count() as u8
}

fn is_digit_string(s: &str, len: u8) -> bool {
    s.len() == usize::from(len) && s.bytes().all(|b| b.is_ascii_digit())
}

/// Limits on the configurable digit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelSettings {
    pub min_digits: u8,
    pub max_digits: u8,
    pub default_digits: u8,
}

impl Default for DuelSettings {
    fn default() -> Self {
        Self {
            min_digits: 2,
            max_digits: 8,
            default_digits: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuelIntent {
    /// Host only, while configuring or after a round.
    SetDigits(u8),
    /// Host only, while configuring or after a round.
    SetStarter(DuelSeat),
    SetSecret(String),
    /// Host only.
    Start,
    Guess(String),
    Restart,
}

impl DuelIntent {
    fn name(&self) -> &'static str {
        match self {
            Self::SetDigits(_) => "set digits",
            Self::SetStarter(_) => "set starter",
            Self::SetSecret(_) => "set secret",
            Self::Start => "start",
            Self::Guess(_) => "guess",
            Self::Restart => "restart",
        }
    }

    /// Statuses in which the intent is accepted.
    fn accepted_in(&self) -> &'static [DuelStatus] {
        use DuelStatus::*;
        match self {
            Self::SetDigits(_) | Self::SetStarter(_) | Self::SetSecret(_) => &[Configuring, Over],
            Self::Start => &[Configuring],
            Self::Guess(_) => &[Playing],
            Self::Restart => &[Playing, Over],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuelOutcome {
    Configured,
    SecretSet,
    Started { turn: DuelSeat },
    Guessed { hits: u8, won: bool },
    Restarted { round: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct DuelEngine {
    settings: DuelSettings,
}

impl DuelEngine {
    pub fn new(settings: DuelSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DuelSettings {
        &self.settings
    }

    fn digits_in_range(&self, len: usize) -> bool {
        (usize::from(self.settings.min_digits)..=usize::from(self.settings.max_digits))
            .contains(&len)
    }

    fn host_only(seat: DuelSeat, intent: &DuelIntent) -> Result<(), Rejection> {
        if seat.is_host() {
            Ok(())
        } else {
            Err(Rejection::NotPermitted {
                seat: seat.to_string(),
                action: intent.name(),
            })
        }
    }
}

impl TurnEngine for DuelEngine {
    type Seat = DuelSeat;
    type Room = DuelRoom;
    type Setup = ();
    type Intent = DuelIntent;
    type Outcome = DuelOutcome;

    const NAMESPACE: Namespace = DUEL_ROOMS;
    const SEATS: &'static [&'static str] = &["A", "B"];

    fn open(
        &self,
        host: DuelSeat,
        _setup: (),
        ctx: &mut EngineCtx<'_>,
    ) -> Result<DuelRoom, Rejection> {
        if !host.is_host() {
            return Err(Rejection::NotPermitted {
                seat: host.to_string(),
                action: "create a room",
            });
        }
        let mut room = DuelRoom {
            digits: self.settings.default_digits,
            created_at: ctx.now,
            last_active: ctx.now,
            ..DuelRoom::default()
        };
        room.players.a = DuelPlayer {
            left: false,
            joined_at: Some(ctx.now),
            ..DuelPlayer::default()
        };
        Ok(room)
    }

    /// Older hosts wrote their seat without `left`; the host seat was
    /// occupied by construction, so it defaults to `false`.
    fn upgrade(raw: &mut Value) {
        if let Some(host) = raw.pointer_mut("/players/A").and_then(Value::as_object_mut) {
            host.entry("left").or_insert(Value::Bool(false));
        }
    }

    fn seat_payload(&self, _seat: DuelSeat, now: u64) -> Value {
        json!({ "secret": "", "joinedAt": now })
    }

    fn offline_patch(&self, _seat: DuelSeat) -> Value {
        json!({ "secret": "" })
    }

    fn precheck(&self, intent: &DuelIntent) -> Result<(), Rejection> {
        match intent {
            DuelIntent::SetDigits(n) if !self.digits_in_range(usize::from(*n)) => {
                Err(Rejection::invalid(format!(
                    "digit count must be {}..={}",
                    self.settings.min_digits, self.settings.max_digits
                )))
            }
            DuelIntent::SetSecret(s) | DuelIntent::Guess(s)
                if !self.digits_in_range(s.len()) || !s.bytes().all(|b| b.is_ascii_digit()) =>
            {
                Err(Rejection::invalid(format!("{s:?} is not a digit string")))
            }
            _ => Ok(()),
        }
    }

    fn apply(
        &self,
        room: &mut DuelRoom,
        seat: DuelSeat,
        intent: &DuelIntent,
        ctx: &mut EngineCtx<'_>,
    ) -> Result<DuelOutcome, Rejection> {
        require_status(&room.status, intent.accepted_in(), intent.name())?;

        match intent {
            DuelIntent::SetDigits(n) => {
                Self::host_only(seat, intent)?;
                room.digits = *n;
                Ok(DuelOutcome::Configured)
            }
            DuelIntent::SetStarter(starter) => {
                Self::host_only(seat, intent)?;
                room.starter = *starter;
                Ok(DuelOutcome::Configured)
            }
            DuelIntent::SetSecret(secret) => {
                if !is_digit_string(secret, room.digits) {
                    return Err(Rejection::invalid(format!(
                        "secret must be {} digits",
                        room.digits
                    )));
                }
                let player = room.players.get_mut(seat);
                player.secret = secret.clone();
                player.left = false;
                Ok(DuelOutcome::SecretSet)
            }
            DuelIntent::Start => {
                Self::host_only(seat, intent)?;
                let ready = [DuelSeat::A, DuelSeat::B]
                    .into_iter()
                    .all(|s| is_digit_string(&room.players.get(s).secret, room.digits));
                if !ready {
                    return Err(Rejection::unmet(format!(
                        "both seats must set a {}-digit secret",
                        room.digits
                    )));
                }
                advance(&mut room.status, DuelStatus::Playing)?;
                room.turn = Some(room.starter);
                room.winner = None;
                Ok(DuelOutcome::Started { turn: room.starter })
            }
            DuelIntent::Guess(guess) => {
                if room.turn != Some(seat) {
                    return Err(Rejection::NotYourTurn);
                }
                if !is_digit_string(guess, room.digits) {
                    return Err(Rejection::invalid(format!(
                        "guess must be {} digits",
                        room.digits
                    )));
                }
                let score = hits(&room.players.get(seat.opponent()).secret, guess);
                room.guesses.push(GuessRecord {
                    by: seat,
                    guess: guess.clone(),
                    hits: score,
                    at: ctx.now,
                    round: room.round,
                });
                let won = score == room.digits;
                if won {
                    advance(&mut room.status, DuelStatus::Over)?;
                    room.winner = Some(seat);
                } else {
                    room.turn = Some(seat.opponent());
                }
                Ok(DuelOutcome::Guessed { hits: score, won })
            }
            DuelIntent::Restart => {
                advance(&mut room.status, DuelStatus::Configuring)?;
                room.round += 1;
                room.turn = None;
                room.winner = None;
                room.guesses.clear();
                room.players.a.secret.clear();
                room.players.b.secret.clear();
                Ok(DuelOutcome::Restarted { round: room.round })
            }
        }
    }
}
