//! Room directory and seat claiming for Roomlink.
//!
//! There is no server to hand out room ids or arbitrate who sits where,
//! so both are built on store transactions:
//!
//! - [`RoomDirectory::allocate`] draws ids from a per-namespace counter
//!   that every client increments transactionally, then checks the id is
//!   not in use.
//! - [`RoomDirectory::claim_seat`] runs a transaction on the seat subtree
//!   that only commits if nobody live holds the seat, so of any number of
//!   concurrent claimants exactly one wins.
//!
//! # Key types
//!
//! - [`RoomDirectory`]: allocate/create/delete rooms, claim/release seats
//! - [`DirectoryConfig`]: allocation retry bound
//! - [`RoomError`]: everything that can go wrong here

mod config;
mod directory;
mod error;
mod seat;

pub use config::DirectoryConfig;
pub use directory::RoomDirectory;
pub use error::RoomError;
