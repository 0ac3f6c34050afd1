//! Turn engines for the Roomlink mini-games.
//!
//! Each game is a [`TurnEngine`]: pure rules that turn a seat's intent
//! into a mutation of the room document. [`EngineRunner`] runs those
//! rules inside a store transaction, so a room only ever moves from one
//! consistent state to the next.
//!
//! | game | module | namespace | seats |
//! |---|---|---|---|
//! | guess duel | [`duel`] | `rooms` | `A`, `B` |
//! | flag game, house mode | [`flags::house`] | `mineRooms` | `host`, `player` |
//! | flag game, PK mode | [`flags::pk`] | `mineRooms` | `A`, `B` |
//! | stock market | [`market`] | `stock_rooms` | `P1` .. `P8` |
//!
//! # Example
//!
//! ```ignore
//! let runner = EngineRunner::new(DuelEngine::default(), store);
//! let outcome = runner.submit(room_id, DuelSeat::B, DuelIntent::Guess("1234".into())).await?;
//! ```

mod blank;
pub mod duel;
mod engine;
mod error;
pub mod flags;
pub mod market;
mod runner;
pub mod status;

pub use duel::{DuelEngine, DuelIntent, DuelOutcome, DuelRoom, DuelSeat};
pub use engine::{EngineCtx, RoomDocument, TurnEngine};
pub use error::{GameError, Rejection};
pub use flags::{FlagLimits, FlagMode, FlagOutcome, HouseEngine, PkEngine};
pub use market::{MarketEngine, MarketIntent, MarketOutcome, MarketRoom, MarketSeat};
pub use runner::EngineRunner;
pub use status::{DuelStatus, FlagStatus, MarketStatus, Status};
