//! Idle-room sweep rules.
//!
//! The rules are a pure function of the room metadata and the current
//! time so every client reaches the same verdict for the same document.

use std::fmt;

use roomlink_protocol::{RoomId, RoomMeta};

use crate::LivenessConfig;

/// Why a room was judged deletable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepReason {
    /// Every known seat is vacant.
    AllLeft,
    /// Every known seat is vacant and the room has been idle past the
    /// soft TTL.
    IdleExpired,
    /// Idle past the hard TTL; seats were not consulted.
    HardExpired,
}

impl fmt::Display for SweepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllLeft => write!(f, "all seats left"),
            Self::IdleExpired => write!(f, "idle past soft ttl"),
            Self::HardExpired => write!(f, "idle past hard ttl"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepVerdict {
    Keep,
    /// The document carries neither `lastActive` nor `createdAt`.
    Skip,
    Delete(SweepReason),
}

/// Decides what the sweep does with one room at `now_millis`.
///
/// Rooms with no timestamp at all are skipped. Otherwise, with
/// `age = now - lastActive` (falling back to `createdAt`), the room goes
/// if every known seat is vacant, or if `age` exceeds the hard TTL.
pub fn sweep_verdict(meta: &RoomMeta, now_millis: u64, config: &LivenessConfig) -> SweepVerdict {
    let Some(touched) = meta.last_touched() else {
        return SweepVerdict::Skip;
    };
    let age = now_millis.saturating_sub(touched);

    if meta.all_known_left() {
        if age > config.soft_ttl.as_millis() as u64 {
            return SweepVerdict::Delete(SweepReason::IdleExpired);
        }
        return SweepVerdict::Delete(SweepReason::AllLeft);
    }
    if age > config.hard_ttl.as_millis() as u64 {
        return SweepVerdict::Delete(SweepReason::HardExpired);
    }
    SweepVerdict::Keep
}

/// Tally of one sweep over a namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: Vec<(RoomId, SweepReason)>,
    /// Rooms with no timestamps, or keys that are not room ids.
    pub skipped: usize,
    /// Rooms whose deletion failed; the sweep carried on regardless.
    pub failed: usize,
}

impl SweepReport {
    pub fn deleted_ids(&self) -> impl Iterator<Item = RoomId> + '_ {
        self.deleted.iter().map(|(id, _)| *id)
    }
}
