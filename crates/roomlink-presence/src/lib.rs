//! Presence and liveness for Roomlink rooms.
//!
//! Rooms have no owner process, so keeping the set of rooms tidy is a
//! shared, best-effort job that every client helps with:
//!
//! 1. **Presence**: [`PresenceManager::attach`] marks a seat online and
//!    arms a disconnect hook that marks it offline if the client
//!    vanishes. The returned [`PresenceGuard`] disarms the hook on a
//!    voluntary exit.
//! 2. **Heartbeat**: each client in a room refreshes `lastActive` every
//!    30 seconds. Failures are logged and ignored.
//! 3. **Cleanup**: on leave, a client deletes the room if every seat is
//!    now vacant ([`PresenceManager::cleanup_if_all_left`]).
//! 4. **Sweep**: every 60 seconds a client scans the whole namespace and
//!    deletes rooms that are abandoned or stale ([`sweep_verdict`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Games / Table facade (above)  ← attach on join, heartbeat while open
//!     ↕
//! Presence (this crate)         ← seat online/offline, room GC
//!     ↕
//! Store + Protocol (below)      ← disconnect hooks, RoomMeta decode
//! ```

mod config;
mod error;
mod guard;
mod manager;
mod sweep;

pub use config::LivenessConfig;
pub use error::PresenceError;
pub use guard::PresenceGuard;
pub use manager::{CleanupOutcome, PresenceManager};
pub use sweep::{SweepReason, SweepReport, SweepVerdict, sweep_verdict};
