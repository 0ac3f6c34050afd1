//! Identity types: room identifiers and game namespaces.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Path, ProtocolError};

// ---------------------------------------------------------------------------
// RoomId
// ---------------------------------------------------------------------------

/// A short numeric room identifier, always four decimal digits.
///
/// Players type these into a join box, so the id space is deliberately
/// tiny: `1000`–`9999`. Uniqueness only holds among rooms that exist at
/// allocation time; ids are reused once a room is deleted.
///
/// On the wire (and as a document key) a `RoomId` is the 4-character
/// string, e.g. `"4821"`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(u16);

impl RoomId {
    /// Smallest valid identifier.
    pub const MIN: u16 = 1000;
    /// Largest valid identifier.
    pub const MAX: u16 = 9999;
    /// Number of distinct identifiers.
    pub const SPACE: u64 = (Self::MAX - Self::MIN + 1) as u64;

    /// Wraps a raw number, rejecting anything outside `1000..=9999`.
    pub fn new(raw: u16) -> Result<Self, ProtocolError> {
        if (Self::MIN..=Self::MAX).contains(&raw) {
            Ok(Self(raw))
        } else {
            Err(ProtocolError::InvalidRoomId(raw.to_string()))
        }
    }

    /// Maps a counter sequence value into the id space (`1000 + seq % 9000`).
    pub fn from_sequence(seq: u64) -> Self {
        // Always in range: MIN + (0..SPACE).
        Self(Self::MIN + (seq % Self::SPACE) as u16)
    }

    /// Returns the numeric value.
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl FromStr for RoomId {
    type Err = ProtocolError;

    /// Parses exactly four ASCII digits. Surrounding whitespace is
    /// rejected so `" 1234"` can't alias `"1234"` as a document key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::InvalidRoomId(s.to_string()));
        }
        let raw: u16 = s
            .parse()
            .map_err(|_| ProtocolError::InvalidRoomId(s.to_string()))?;
        Self::new(raw).map_err(|_| ProtocolError::InvalidRoomId(s.to_string()))
    }
}

impl TryFrom<String> for RoomId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.to_string()
    }
}

// ---------------------------------------------------------------------------
// Namespace
// ---------------------------------------------------------------------------

/// The collection a game keeps its rooms in (e.g. `"rooms"` for the duel).
///
/// Each game type owns one namespace; room documents live at
/// `<namespace>/<room id>` and the allocation counter at
/// `roomCounters/<counter key>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(Cow<'static, str>);

impl Namespace {
    /// Root under which every namespace keeps its allocation counter.
    pub const COUNTERS_ROOT: &'static str = "roomCounters";

    /// Creates a namespace from a string literal. Usable in `const` items.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates a namespace from an owned name, validating it as a path.
    pub fn new(name: impl Into<String>) -> Result<Self, ProtocolError> {
        let name = name.into();
        Path::parse(&name)?;
        Ok(Self(Cow::Owned(name)))
    }

    /// The namespace name as written in paths.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Counter key: the name with every character outside
    /// `[A-Za-z0-9_]` replaced by `_`, so nested namespaces such as
    /// `games/duel` map to a single flat key.
    pub fn counter_key(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect()
    }

    /// Path of the shared allocation counter.
    pub fn counter_path(&self) -> Path {
        Path::root().child(Self::COUNTERS_ROOT).child(self.counter_key())
    }

    /// Path of the collection itself (all rooms).
    pub fn root(&self) -> Path {
        Path::root().join(self.as_str())
    }

    /// Path of one room document.
    pub fn room_path(&self, room_id: RoomId) -> Path {
        self.root().child(room_id)
    }

    /// Path of one seat inside a room document.
    pub fn seat_path(&self, room_id: RoomId, seat: &str) -> Path {
        self.room_path(room_id).child("players").child(seat)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
