//! # Roomlink
//!
//! Serverless multiplayer rooms for small turn-based games.
//!
//! There is no game server: every client talks to a shared document
//! store, and the store's per-path transactions are the only place
//! writes are serialized. Roomlink layers the pieces a game needs on top:
//!
//! - short numeric room codes allocated from a shared counter
//!   (`roomlink-room`),
//! - seat claims that cannot double-book,
//! - presence via disconnect hooks, heartbeats and idle-room sweeps
//!   (`roomlink-presence`),
//! - turn engines that apply intents atomically (`roomlink-games`).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomlink::prelude::*;
//!
//! # async fn demo() -> Result<(), RoomlinkError> {
//! let store = MemoryStore::new();
//! let host = LobbyBuilder::new().build(store.connect());
//! let guest = LobbyBuilder::new().build(store.connect());
//!
//! let a = host.create_table(DuelEngine::default(), DuelSeat::A, ()).await?;
//! let b = guest
//!     .join_table(DuelEngine::default(), a.room_id(), DuelSeat::B)
//!     .await?;
//! b.submit(DuelIntent::SetSecret("5678".into())).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod lobby;
mod table;

pub use error::RoomlinkError;
pub use lobby::{Lobby, LobbyBuilder};
pub use table::Table;

/// Everything a client needs to open, join and play tables.
pub mod prelude {
    pub use crate::{Lobby, LobbyBuilder, RoomlinkError, Table};
    pub use roomlink_games::market::MarketSetup;
    pub use roomlink_games::{
        DuelEngine, DuelIntent, DuelOutcome, DuelRoom, DuelSeat, EngineRunner, FlagMode,
        FlagOutcome, HouseEngine, MarketEngine, MarketIntent, MarketOutcome, MarketRoom,
        MarketSeat, PkEngine, Rejection, Status, TurnEngine,
    };
    pub use roomlink_presence::{CleanupOutcome, LivenessConfig};
    pub use roomlink_protocol::{Clock, ManualClock, Namespace, RoomId, SystemClock};
    pub use roomlink_room::DirectoryConfig;
    pub use roomlink_store::{DocumentStore, MemoryClient, MemoryStore, Snapshot, Subscription};
}
