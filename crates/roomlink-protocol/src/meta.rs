//! The minimum contract shared by every room document.
//!
//! Whatever the game, a room document has a `status`, two timestamps,
//! and a `players` map of seats that each carry a `left` flag. The
//! presence layer (sweeping, cleanup) only ever looks at this view, so
//! it can manage rooms of any game without knowing their payload.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Presence fields of one seat.
///
/// A seat entry written without `left` decodes as `left: true`: a seat
/// nobody ever confirmed is treated as vacant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeatPresence {
    pub left: bool,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_joined_at"
    )]
    pub joined_at: Option<u64>,
    /// Game-specific seat fields, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for SeatPresence {
    fn default() -> Self {
        Self {
            left: true,
            joined_at: None,
            extra: Map::new(),
        }
    }
}

/// Game-independent view of a room document.
///
/// Unknown fields (the game payload) are ignored when decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomMeta {
    pub status: String,
    #[serde(deserialize_with = "deserialize_millis")]
    pub created_at: u64,
    #[serde(deserialize_with = "deserialize_millis")]
    pub last_active: u64,
    pub players: BTreeMap<String, SeatPresence>,
}

impl RoomMeta {
    /// When the room was last known to be in use: `lastActive`, falling
    /// back to `createdAt`. `None` if neither was ever written.
    pub fn last_touched(&self) -> Option<u64> {
        [self.last_active, self.created_at]
            .into_iter()
            .find(|&t| t > 0)
    }

    /// `true` if `seat` is vacant. Seats missing from the map count as left.
    pub fn seat_left(&self, seat: &str) -> bool {
        self.players.get(seat).is_none_or(|p| p.left)
    }

    /// `true` if every listed seat is vacant.
    pub fn all_left<'a>(&self, seats: impl IntoIterator<Item = &'a str>) -> bool {
        seats.into_iter().all(|s| self.seat_left(s))
    }

    /// `true` if every seat present in the map is vacant (vacuously true
    /// for an empty map).
    pub fn all_known_left(&self) -> bool {
        self.players.values().all(|p| p.left)
    }

    /// Seats currently held by a live occupant.
    pub fn occupied_seats(&self) -> impl Iterator<Item = &str> {
        self.players
            .iter()
            .filter(|(_, p)| !p.left)
            .map(|(k, _)| k.as_str())
    }
}

/// Reads a millisecond timestamp written either as an integer or as a
/// float (JavaScript clients write `Date.now()` through a double). The
/// fraction is dropped; `null` and negative values read as `0`, which
/// every caller treats as "never written".
///
/// Use with `#[serde(deserialize_with = "roomlink_protocol::deserialize_millis")]`.
pub fn deserialize_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    deserializer.deserialize_any(MillisVisitor)
}

fn deserialize_joined_at<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    deserialize_millis(deserializer).map(|t| (t > 0).then_some(t))
}

struct MillisVisitor;

impl<'de> Visitor<'de> for MillisVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a millisecond timestamp")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
        Ok(u64::try_from(v).unwrap_or(0))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<u64, E> {
        if !v.is_finite() {
            return Err(E::invalid_value(de::Unexpected::Float(v), &self));
        }
        // `as` saturates: negatives become 0.
        Ok(v as u64)
    }

    fn visit_unit<E: de::Error>(self) -> Result<u64, E> {
        Ok(0)
    }

    fn visit_none<E: de::Error>(self) -> Result<u64, E> {
        Ok(0)
    }
}
