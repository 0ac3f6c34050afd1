//! Shared vocabulary for Roomlink.
//!
//! This crate defines what every other layer talks about:
//!
//! - **Identifiers** ([`RoomId`], [`Namespace`]): which room, in which
//!   game's collection.
//! - **Paths** ([`Path`]): where a value lives inside the shared
//!   document tree.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how typed room
//!   documents are converted to/from the store's JSON values.
//! - **Room metadata** ([`RoomMeta`], [`SeatPresence`]): the minimum
//!   contract every room document honours, decoded with defaults.
//! - **Clock** ([`Clock`]): epoch-millisecond time, swappable in tests.
//!
//! ```text
//! Store (JSON values) → Protocol (typed documents) → Rooms / Games
//! ```

mod clock;
mod codec;
mod error;
mod meta;
mod path;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use meta::{RoomMeta, SeatPresence, deserialize_millis};
pub use path::Path;
pub use types::{Namespace, RoomId};
