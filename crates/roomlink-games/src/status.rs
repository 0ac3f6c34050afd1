//! Room status state machines.
//!
//! Every game stores its status as a lowercase string. The enums below
//! close that set and spell out which changes are legal; engines move a
//! room only through [`advance`], so an intent can never push a room
//! along an edge that is not in the table. Staying in the same status is
//! always legal (configuration edits, guesses that don't end the round).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Rejection;

/// A closed set of room statuses with a transition table.
pub trait Status: Copy + Eq + fmt::Display {
    /// Returns `true` if moving from `self` to `target` is in the table.
    fn can_transition_to(self, target: Self) -> bool;
}

/// Moves `status` to `target`, or rejects the change.
pub(crate) fn advance<S: Status>(status: &mut S, target: S) -> Result<(), Rejection> {
    if *status == target || status.can_transition_to(target) {
        *status = target;
        Ok(())
    } else {
        Err(Rejection::IllegalTransition {
            from: status.to_string(),
            to: target.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// DuelStatus
// ---------------------------------------------------------------------------

/// ```text
/// Configuring → Playing → Over
///      ↑           │        │
///      └───────────┴────────┘   (restart)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuelStatus {
    #[default]
    Configuring,
    Playing,
    Over,
}

impl Status for DuelStatus {
    fn can_transition_to(self, target: Self) -> bool {
        use DuelStatus::*;
        matches!(
            (self, target),
            (Configuring, Playing) | (Playing, Over) | (Playing, Configuring) | (Over, Configuring)
        )
    }
}

impl fmt::Display for DuelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuring => write!(f, "configuring"),
            Self::Playing => write!(f, "playing"),
            Self::Over => write!(f, "over"),
        }
    }
}

// ---------------------------------------------------------------------------
// FlagStatus
// ---------------------------------------------------------------------------

/// Shared by both flag game modes.
///
/// ```text
/// Setup → Playing → Over
///   ↑        │        │
///   └────────┴────────┘   (round reset)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagStatus {
    #[default]
    Setup,
    Playing,
    Over,
}

impl Status for FlagStatus {
    fn can_transition_to(self, target: Self) -> bool {
        use FlagStatus::*;
        matches!(
            (self, target),
            (Setup, Playing) | (Playing, Over) | (Playing, Setup) | (Over, Setup)
        )
    }
}

impl fmt::Display for FlagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Playing => write!(f, "playing"),
            Self::Over => write!(f, "over"),
        }
    }
}

// ---------------------------------------------------------------------------
// MarketStatus
// ---------------------------------------------------------------------------

/// ```text
/// Waiting → Borrowing → Playing → Over
///               ↑          │        │
///               └──────────┴────────┘   (restart)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    #[default]
    Waiting,
    Borrowing,
    Playing,
    Over,
}

impl MarketStatus {
    /// Returns `true` while new traders may take a seat.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }
}

impl Status for MarketStatus {
    fn can_transition_to(self, target: Self) -> bool {
        use MarketStatus::*;
        matches!(
            (self, target),
            (Waiting, Borrowing)
                | (Borrowing, Playing)
                | (Playing, Over)
                | (Playing, Borrowing)
                | (Over, Borrowing)
        )
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Borrowing => write!(f, "borrowing"),
            Self::Playing => write!(f, "playing"),
            Self::Over => write!(f, "over"),
        }
    }
}
