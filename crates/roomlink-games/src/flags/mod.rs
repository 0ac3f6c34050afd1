//! The flag games: flags are planted on a grid, some of them over
//! mines, and the guessing side picks flags one at a time. A safe flag
//! scores; a mine ends the round.
//!
//! Two modes share the `mineRooms` collection and are told apart by the
//! document's `mode` field:
//!
//! - [`house`]: one seat (`host`) builds a single board, the other
//!   (`player`) guesses it.
//! - [`pk`]: seats `A` and `B` each build a private field, then take
//!   turns guessing the opponent's.

pub mod house;
pub mod pk;

use std::fmt;

use roomlink_protocol::Namespace;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::Rejection;

pub use house::{HouseEngine, HouseIntent, HousePlayers, HouseRoom, HouseScores, HouseSeat};
pub use pk::{PkEngine, PkIntent, PkPair, PkRoom, PkSeat};

/// Collection both flag modes keep their rooms in.
pub const FLAG_ROOMS: Namespace = Namespace::from_static("mineRooms");

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Stored as `"house"` / `"pk"`. Anything other than `"pk"` reads as
/// house, which is what rooms written before PK existed need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagMode {
    #[default]
    House,
    Pk,
}

impl FlagMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::House => "house",
            Self::Pk => "pk",
        }
    }

    /// Mode of a raw room document.
    pub fn of(raw: &Value) -> Self {
        match raw.get("mode").and_then(Value::as_str) {
            Some("pk") => Self::Pk,
            _ => Self::House,
        }
    }

    pub(crate) fn expect(raw: &Value, expected: Self) -> Result<(), Rejection> {
        let actual = Self::of(raw);
        if actual == expected {
            Ok(())
        } else {
            Err(Rejection::WrongMode {
                expected: expected.as_str(),
                actual: actual.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for FlagMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FlagMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FlagMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<String>::deserialize(deserializer)?.as_deref() {
            Some("pk") => Self::Pk,
            _ => Self::House,
        })
    }
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Bounds for board and scoring configuration. Out-of-range values are
/// clamped, not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagLimits {
    pub min_grid: u8,
    pub max_grid: u8,
    pub default_grid: u8,
    /// Upper bound on flags per board, further capped by the cell count.
    pub max_flags: usize,
    /// Upper bound for entry fee and hit score.
    pub max_points: u32,
    pub default_entry_fee: u32,
    pub default_hit_score: u32,
}

impl Default for FlagLimits {
    fn default() -> Self {
        Self {
            min_grid: 4,
            max_grid: 12,
            default_grid: 8,
            max_flags: 100,
            max_points: 999,
            default_entry_fee: 2,
            default_hit_score: 1,
        }
    }
}

impl FlagLimits {
    pub fn clamp_grid(&self, n: u32) -> u8 {
        n.clamp(u32::from(self.min_grid), u32::from(self.max_grid)) as u8
    }

    pub fn clamp_points(&self, n: u32) -> u32 {
        n.min(self.max_points)
    }

    pub fn flag_cap(&self, width: u8, height: u8) -> usize {
        self.max_flags.min(usize::from(width) * usize::from(height))
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    /// `"<x>-<y>"`, unique per board.
    pub id: String,
    pub x: u8,
    pub y: u8,
    #[serde(default)]
    pub mine: bool,
}

pub fn flag_id(x: u8, y: u8) -> String {
    format!("{x}-{y}")
}

/// One edit to a board under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEdit {
    Place { x: u8, y: u8 },
    ToggleMine { x: u8, y: u8 },
    Remove { x: u8, y: u8 },
}

pub(crate) fn edit_board(
    flags: &mut Vec<Flag>,
    width: u8,
    height: u8,
    edit: BoardEdit,
    limits: &FlagLimits,
) -> Result<(), Rejection> {
    let (BoardEdit::Place { x, y } | BoardEdit::ToggleMine { x, y } | BoardEdit::Remove { x, y }) =
        edit;
    if x >= width || y >= height {
        return Err(Rejection::invalid(format!(
            "cell {x},{y} is outside the {width}x{height} grid"
        )));
    }
    let id = flag_id(x, y);
    let existing = flags.iter().position(|f| f.id == id);

    match (edit, existing) {
        (BoardEdit::Place { .. }, Some(_)) => {
            Err(Rejection::unmet(format!("cell {id} already has a flag")))
        }
        (BoardEdit::Place { .. }, None) => {
            let cap = limits.flag_cap(width, height);
            if flags.len() >= cap {
                return Err(Rejection::unmet(format!("board is full ({cap} flags)")));
            }
            flags.push(Flag {
                id,
                x,
                y,
                mine: false,
            });
            Ok(())
        }
        (BoardEdit::ToggleMine { .. }, Some(i)) => {
            flags[i].mine = !flags[i].mine;
            Ok(())
        }
        (BoardEdit::Remove { .. }, Some(i)) => {
            flags.remove(i);
            Ok(())
        }
        (_, None) => Err(Rejection::invalid(format!("no flag at {id}"))),
    }
}

/// A board can be played once it has at least one flag and one mine.
pub(crate) fn check_playable(flags: &[Flag]) -> Result<(), Rejection> {
    if flags.is_empty() {
        return Err(Rejection::unmet("place at least one flag"));
    }
    if !flags.iter().any(|f| f.mine) {
        return Err(Rejection::unmet("mark at least one flag as a mine"));
    }
    Ok(())
}

/// Number of flags without a mine.
pub fn safe_total(flags: &[Flag]) -> usize {
    flags.iter().filter(|f| !f.mine).count()
}

/// Safe flags not guessed yet.
pub fn safe_left(flags: &[Flag], guessed: &[String]) -> usize {
    let found = guessed
        .iter()
        .filter(|id| flags.iter().any(|f| &f.id == *id && !f.mine))
        .count();
    safe_total(flags).saturating_sub(found)
}

/// What a single guess uncovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessResult {
    Mine,
    /// `cleared` is set when this was the last safe flag.
    Safe { cleared: bool },
}

/// Records a guess at `(x, y)` against `flags`.
pub(crate) fn guess_flag(
    flags: &[Flag],
    guessed: &mut Vec<String>,
    x: u8,
    y: u8,
) -> Result<GuessResult, Rejection> {
    let id = flag_id(x, y);
    if guessed.contains(&id) {
        return Err(Rejection::AlreadyGuessed(id));
    }
    let Some(flag) = flags.iter().find(|f| f.id == id) else {
        return Err(Rejection::invalid(format!("no flag at {id}")));
    };
    guessed.push(id);
    if flag.mine {
        Ok(GuessResult::Mine)
    } else {
        Ok(GuessResult::Safe {
            cleared: safe_left(flags, guessed) == 0,
        })
    }
}

/// What a flag-game intent did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagOutcome {
    Configured,
    Edited,
    /// PK only; `started` is set when this confirmation was the second.
    Confirmed { started: bool },
    Started,
    Guessed(GuessResult),
    Reset { round: u32 },
}

/// Upgrades a seat entry written without `left`.
pub(crate) fn default_left(raw: &mut Value, seat: &str, left: bool) {
    let pointer = format!("/players/{seat}");
    if let Some(entry) = raw.pointer_mut(&pointer).and_then(Value::as_object_mut) {
        entry.entry("left").or_insert(Value::Bool(left));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn board(cells: &[(u8, u8, bool)]) -> Vec<Flag> {
        cells
            .iter()
            .map(|&(x, y, mine)| Flag {
                id: flag_id(x, y),
                x,
                y,
                mine,
            })
            .collect()
    }

    #[test]
    fn test_mode_of_raw_document() {
        assert_eq!(FlagMode::of(&json!({ "mode": "pk" })), FlagMode::Pk);
        assert_eq!(FlagMode::of(&json!({ "mode": "house" })), FlagMode::House);
        assert_eq!(FlagMode::of(&json!({})), FlagMode::House);
        let mode: FlagMode = serde_json::from_value(json!("weird")).unwrap();
        assert_eq!(mode, FlagMode::House);
    }

    #[test]
    fn test_limits_clamp() {
        let limits = FlagLimits::default();
        assert_eq!(limits.clamp_grid(2), 4);
        assert_eq!(limits.clamp_grid(40), 12);
        assert_eq!(limits.clamp_points(5000), 999);
        assert_eq!(limits.flag_cap(4, 4), 16);
        assert_eq!(limits.flag_cap(12, 12), 100);
    }

    #[test]
    fn test_edit_board_place_toggle_remove() {
        let limits = FlagLimits::default();
        let mut flags = Vec::new();
        edit_board(&mut flags, 8, 8, BoardEdit::Place { x: 1, y: 2 }, &limits).unwrap();
        assert!(edit_board(&mut flags, 8, 8, BoardEdit::Place { x: 1, y: 2 }, &limits).is_err());
        edit_board(&mut flags, 8, 8, BoardEdit::ToggleMine { x: 1, y: 2 }, &limits).unwrap();
        assert!(flags[0].mine);
        assert!(edit_board(&mut flags, 8, 8, BoardEdit::ToggleMine { x: 0, y: 0 }, &limits).is_err());
        edit_board(&mut flags, 8, 8, BoardEdit::Remove { x: 1, y: 2 }, &limits).unwrap();
        assert!(flags.is_empty());
    }

    #[test]
    fn test_edit_board_bounds_and_cap() {
        let limits = FlagLimits {
            max_flags: 2,
            ..FlagLimits::default()
        };
        let mut flags = Vec::new();
        assert!(edit_board(&mut flags, 4, 4, BoardEdit::Place { x: 4, y: 0 }, &limits).is_err());
        edit_board(&mut flags, 4, 4, BoardEdit::Place { x: 0, y: 0 }, &limits).unwrap();
        edit_board(&mut flags, 4, 4, BoardEdit::Place { x: 1, y: 0 }, &limits).unwrap();
        assert!(edit_board(&mut flags, 4, 4, BoardEdit::Place { x: 2, y: 0 }, &limits).is_err());
    }

    #[test]
    fn test_check_playable() {
        assert!(check_playable(&[]).is_err());
        assert!(check_playable(&board(&[(0, 0, false)])).is_err());
        assert!(check_playable(&board(&[(0, 0, false), (1, 1, true)])).is_ok());
    }

    #[test]
    fn test_guess_flag_until_cleared() {
        let flags = board(&[(0, 0, false), (1, 0, false), (2, 0, true)]);
        let mut guessed = Vec::new();
        assert_eq!(
            guess_flag(&flags, &mut guessed, 0, 0).unwrap(),
            GuessResult::Safe { cleared: false }
        );
        assert_eq!(
            guess_flag(&flags, &mut guessed, 0, 0),
            Err(Rejection::AlreadyGuessed("0-0".into()))
        );
        assert_eq!(
            guess_flag(&flags, &mut guessed, 1, 0).unwrap(),
            GuessResult::Safe { cleared: true }
        );
        assert!(guess_flag(&flags, &mut guessed, 5, 5).is_err());
        assert_eq!(guessed.len(), 2);
    }

    #[test]
    fn test_guess_mine() {
        let flags = board(&[(0, 0, true)]);
        let mut guessed = Vec::new();
        assert_eq!(guess_flag(&flags, &mut guessed, 0, 0).unwrap(), GuessResult::Mine);
        assert_eq!(safe_left(&flags, &guessed), 0);
    }

    #[test]
    fn test_default_left_only_fills_missing() {
        let mut raw = json!({ "players": { "host": {}, "player": { "left": false } } });
        default_left(&mut raw, "host", false);
        default_left(&mut raw, "player", true);
        default_left(&mut raw, "ghost", true);
        assert_eq!(raw["players"]["host"]["left"], false);
        assert_eq!(raw["players"]["player"]["left"], false);
        assert!(raw["players"].get("ghost").is_none());
    }
}
