//! The stock market: up to eight traders borrow, then buy, sell and tag
//! listed companies over a fixed number of rounds.
//!
//! A game runs `waiting -> borrowing -> playing -> over`. Traders join
//! while the room is waiting ([`MarketEngine::admit`]), the host (`P1`)
//! opens borrowing, and trading starts once every trader has taken a
//! loan. A round closes when every active trader is ready or bankrupt;
//! the closing intent resolves it in the same transaction (see
//! [`resolve`]).

mod content;
mod report;
pub mod resolve;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rand::Rng;
use rand::rngs::StdRng;
use roomlink_protocol::Namespace;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};

use crate::engine::require_status;
use crate::status::{MarketStatus, advance};
use crate::{EngineCtx, Rejection, RoomDocument, TurnEngine};

pub use content::{EventDeck, EventSource, Listing, ListingSource, NameTable};
pub use report::{Standing, holdings_value, leaderboard, net_worth};
pub use resolve::{RoundSummary, Split, SplitKind};

/// Collection the market keeps its rooms in.
pub const STOCK_ROOMS: Namespace = Namespace::from_static("stock_rooms");

/// Largest table size.
pub const MAX_TRADERS: u8 = 8;

// ---------------------------------------------------------------------------
// Seats
// ---------------------------------------------------------------------------

/// A trader seat, `P1` through `P8`. `P1` created the room and hosts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarketSeat(u8);

impl MarketSeat {
    pub const HOST: Self = Self(1);

    pub fn new(number: u8) -> Result<Self, Rejection> {
        if (1..=MAX_TRADERS).contains(&number) {
            Ok(Self(number))
        } else {
            Err(Rejection::invalid(format!(
                "trader seats run P1..P{MAX_TRADERS}, got P{number}"
            )))
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn is_host(self) -> bool {
        self == Self::HOST
    }
}

impl fmt::Display for MarketSeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl FromStr for MarketSeat {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('P')
            .and_then(|n| n.parse::<u8>().ok())
            .ok_or_else(|| Rejection::invalid(format!("unknown trader seat {s:?}")))
            .and_then(Self::new)
    }
}

impl Serialize for MarketSeat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MarketSeat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stock {
    pub name: String,
    pub sector: String,
    pub price: f64,
    pub shares: u64,
    /// Closing prices, oldest first.
    pub history: Vec<f64>,
    /// Last round in which the stock may be bought, before events.
    pub buy_limit_round: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Stock {
    pub fn list(listing: Listing, price: f64, buy_limit_round: u32) -> Self {
        Self {
            name: listing.name,
            sector: listing.sector,
            price,
            shares: listing.shares,
            history: vec![price],
            buy_limit_round,
            extra: Map::new(),
        }
    }

    pub fn market_cap(&self) -> f64 {
        self.shares as f64 * self.price
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whisper {
    pub from: MarketSeat,
    pub text: String,
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub from: MarketSeat,
    pub emoji: String,
    pub time: u64,
}

/// One trader's book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Trader {
    pub cash: f64,
    /// Sale proceeds, credited when the round resolves.
    pub pending_cash: f64,
    pub loan: f64,
    /// Shares held, indexed like the room's stocks.
    pub holdings: Vec<u64>,
    pub ready: bool,
    pub left: bool,
    pub is_bankrupt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whisper: Option<Whisper>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<Reaction>,
    /// Fields this version does not model; written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Trader {
    fn default() -> Self {
        Self {
            cash: 0.0,
            pending_cash: 0.0,
            loan: 0.0,
            holdings: Vec::new(),
            ready: false,
            left: true,
            is_bankrupt: false,
            joined_at: None,
            whisper: None,
            emoji: None,
            extra: Map::new(),
        }
    }
}

impl Trader {
    /// A trader who just sat down at a market with `listings` stocks.
    pub fn fresh(listings: usize, now: u64) -> Self {
        Self {
            holdings: vec![0; listings],
            left: false,
            joined_at: Some(now),
            ..Self::default()
        }
    }

    pub fn holding(&self, idx: usize) -> u64 {
        self.holdings.get(idx).copied().unwrap_or(0)
    }

    fn holding_mut(&mut self, idx: usize) -> &mut u64 {
        if self.holdings.len() <= idx {
            self.holdings.resize(idx + 1, 0);
        }
        &mut self.holdings[idx]
    }

    /// Clears the book for a new game; presence and messages survive.
    fn reset(&mut self, listings: usize) {
        self.cash = 0.0;
        self.pending_cash = 0.0;
        self.loan = 0.0;
        self.holdings = vec![0; listings];
        self.ready = false;
        self.is_bankrupt = false;
    }
}

/// A stock or a whole sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Scope {
    Index(usize),
    Sector(String),
}

impl Scope {
    pub fn covers(&self, idx: usize, stock: &Stock) -> bool {
        match self {
            Self::Index(i) => *i == idx,
            Self::Sector(s) => *s == stock.sector,
        }
    }
}

/// What an event acts on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum EventTarget {
    /// Every stock's price.
    All,
    Index(usize),
    Sector(String),
    /// Shifts the buy-limit round by the event's `limit_change`.
    BuyLimit(Scope),
    /// Suspends buying.
    TempBan(Scope),
    /// News only.
    Headline,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[default]
    News,
    /// Raised by a buying frenzy.
    Pump,
    /// Announces a trader's tag.
    Tag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketEvent {
    pub id: String,
    pub message: String,
    /// Price multiplier applied at each resolution while active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<f64>,
    /// Resolutions left before the event expires.
    pub duration: u32,
    pub target: EventTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_change: Option<i32>,
    #[serde(default)]
    pub kind: EventKind,
}

impl MarketEvent {
    /// The multiplier this event applies to stock `idx`, if any.
    pub fn multiplier_for(&self, idx: usize, stock: &Stock) -> Option<f64> {
        let hits = match &self.target {
            EventTarget::All => true,
            EventTarget::Index(i) => *i == idx,
            EventTarget::Sector(s) => *s == stock.sector,
            EventTarget::BuyLimit(_) | EventTarget::TempBan(_) | EventTarget::Headline => false,
        };
        if hits { self.impact } else { None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketConfig {
    /// Inclusive `[min, max]` loan size.
    pub loan_range: [u64; 2],
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            loan_range: [50_000, 500_000],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketRoom {
    pub status: MarketStatus,
    pub round: u32,
    pub max_rounds: u32,
    pub max_players: u8,
    pub config: MarketConfig,
    pub stocks: Vec<Stock>,
    pub events: Vec<MarketEvent>,
    pub players: BTreeMap<MarketSeat, Trader>,
    /// Notes only their owner reads, cleared on acknowledgement.
    pub private_notes: BTreeMap<MarketSeat, Vec<String>>,
    /// Summed tag impact per stock for the current round.
    pub active_tags: BTreeMap<usize, f64>,
    /// Cash spent buying each stock in the current round.
    pub turn_buys: BTreeMap<usize, f64>,
    /// Average relative price change per sector at the last resolution.
    pub sector_performance: BTreeMap<String, f64>,
    #[serde(deserialize_with = "roomlink_protocol::deserialize_millis")]
    pub created_at: u64,
    #[serde(deserialize_with = "roomlink_protocol::deserialize_millis")]
    pub last_active: u64,
    pub round_start_time: u64,
    /// Fields this version does not model; written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for MarketRoom {
    fn default() -> Self {
        Self {
            status: MarketStatus::Waiting,
            round: 1,
            max_rounds: 20,
            max_players: 4,
            config: MarketConfig::default(),
            stocks: Vec::new(),
            events: Vec::new(),
            players: BTreeMap::new(),
            private_notes: BTreeMap::new(),
            active_tags: BTreeMap::new(),
            turn_buys: BTreeMap::new(),
            sector_performance: BTreeMap::new(),
            created_at: 0,
            last_active: 0,
            round_start_time: 0,
            extra: Map::new(),
        }
    }
}

impl RoomDocument for MarketRoom {
    fn touch(&mut self, now_millis: u64) {
        self.last_active = now_millis;
    }
}

impl MarketRoom {
    pub fn trader(&self, seat: MarketSeat) -> Option<&Trader> {
        self.players.get(&seat)
    }

    fn trader_mut(&mut self, seat: MarketSeat) -> Result<&mut Trader, Rejection> {
        self.players
            .get_mut(&seat)
            .ok_or_else(|| Rejection::unmet(format!("nobody sits at {seat}")))
    }

    fn stock(&self, idx: usize) -> Result<&Stock, Rejection> {
        self.stocks
            .get(idx)
            .ok_or_else(|| Rejection::invalid(format!("no stock #{idx}")))
    }

    /// Seats whose trader has not left.
    pub fn active_seats(&self) -> impl Iterator<Item = MarketSeat> + '_ {
        self.players
            .iter()
            .filter(|(_, t)| !t.left)
            .map(|(seat, _)| *seat)
    }

    pub fn active_count(&self) -> usize {
        self.active_seats().count()
    }

    /// `true` when at least one trader is active and each active trader
    /// is ready or bankrupt.
    pub fn everyone_ready(&self) -> bool {
        let mut active = self.players.values().filter(|t| !t.left).peekable();
        active.peek().is_some() && active.all(|t| t.ready || t.is_bankrupt)
    }

    /// Last round stock `idx` may be bought in, after buy-limit events.
    pub fn buy_limit_round(&self, idx: usize) -> u32 {
        let Some(stock) = self.stocks.get(idx) else {
            return 0;
        };
        let shift: i64 = self
            .events
            .iter()
            .filter(|e| matches!(&e.target, EventTarget::BuyLimit(scope) if scope.covers(idx, stock)))
            .filter_map(|e| e.limit_change)
            .map(i64::from)
            .sum();
        (i64::from(stock.buy_limit_round) + shift).clamp(0, i64::from(u32::MAX)) as u32
    }

    /// `true` while a temp-ban event covers stock `idx`.
    pub fn is_suspended(&self, idx: usize) -> bool {
        let Some(stock) = self.stocks.get(idx) else {
            return false;
        };
        self.events
            .iter()
            .any(|e| matches!(&e.target, EventTarget::TempBan(scope) if scope.covers(idx, stock)))
    }

    /// Whether `seat` may buy stock `idx` right now.
    pub fn can_buy(&self, seat: MarketSeat, idx: usize) -> bool {
        self.check_buy(seat, idx).is_ok()
    }

    fn check_buy(&self, seat: MarketSeat, idx: usize) -> Result<(), Rejection> {
        require_status(&self.status, &[MarketStatus::Playing], "buy")?;
        let stock = self.stock(idx)?;
        if self.trader(seat).is_some_and(|t| t.is_bankrupt) {
            return Err(Rejection::unmet("bankrupt traders cannot trade"));
        }
        let limit = self.buy_limit_round(idx);
        if self.round > limit {
            return Err(Rejection::unmet(format!(
                "buying {} closed after round {limit}",
                stock.name
            )));
        }
        if self.is_suspended(idx) {
            return Err(Rejection::unmet(format!("{} is suspended", stock.name)));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Tuning for the market. Defaults are the production values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    /// Stocks listed per game.
    pub listings: usize,
    /// Games last `min_rounds..=min_rounds + extra_rounds` rounds.
    pub min_rounds: u32,
    pub extra_rounds: u32,
    /// Opening prices are drawn from `[open_price, open_price + open_price_span)`.
    pub open_price: f64,
    pub open_price_span: f64,
    /// Share of the game during which stocks may be bought.
    pub buy_limit_share: f64,
    pub round_window_secs: u64,
    /// Charged on the loan when valuing a trader.
    pub interest_rate: f64,
    /// A trader with no cash whose holdings are worth less than this
    /// share of the loan goes bankrupt.
    pub bankruptcy_ratio: f64,
    pub drift: f64,
    pub volatility: f64,
    /// Caps at or below this value move with full volatility.
    pub stability_cap: f64,
    pub min_stability: f64,
    pub price_floor: f64,
    pub split_above: f64,
    pub reverse_split_below: f64,
    pub history_len: usize,
    /// Chance of a new event per resolution (and at listing time).
    pub event_chance: f64,
    /// Share of total wealth spent on one stock in a round that sets off
    /// a pump.
    pub pump_threshold: f64,
    /// Same, for stocks worth more than `large_cap_factor` times the
    /// average trader.
    pub large_cap_pump_threshold: f64,
    pub large_cap_factor: f64,
    pub pump_impact: f64,
    pub pump_duration: u32,
    pub pump_extension: u32,
    /// Smallest tag stake as a share of market cap.
    pub tag_min_stake: f64,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            listings: 10,
            min_rounds: 20,
            extra_rounds: 10,
            open_price: 20.0,
            open_price_span: 30.0,
            buy_limit_share: 0.75,
            round_window_secs: 30,
            interest_rate: 0.03,
            bankruptcy_ratio: 0.1,
            drift: 0.005,
            volatility: 0.15,
            stability_cap: 5_000_000.0,
            min_stability: 0.3,
            price_floor: 0.1,
            split_above: 200.0,
            reverse_split_below: 5.0,
            history_len: 20,
            event_chance: 0.28,
            pump_threshold: 0.27,
            large_cap_pump_threshold: 0.35,
            large_cap_factor: 1.5,
            pump_impact: 1.25,
            pump_duration: 3,
            pump_extension: 2,
            tag_min_stake: 0.0005,
        }
    }
}

/// Price pressure of a tag staking `ratio` of the stock's market cap.
pub fn tag_impact(ratio: f64) -> f64 {
    match ratio {
        r if r < 0.001 => 0.03,
        r if r < 0.005 => 0.08,
        r if r < 0.02 => 0.18,
        _ => 0.35,
    }
}

pub(crate) fn round_cents(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// What the host picks when opening a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketSetup {
    pub max_players: u8,
    pub loan_range: [u64; 2],
}

impl Default for MarketSetup {
    fn default() -> Self {
        Self {
            max_players: 4,
            loan_range: MarketConfig::default().loan_range,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketIntent {
    /// Host only: close the lobby and open borrowing.
    Start,
    TakeLoan(u64),
    Buy { stock: usize, quantity: u64 },
    /// Proceeds are credited when the round resolves.
    Sell { stock: usize, quantity: u64 },
    /// Spend `stake` to push the stock's next close up or down.
    Tag { stock: usize, stake: u64, bullish: bool },
    Whisper { to: MarketSeat, text: String },
    Emoji { to: MarketSeat, emoji: String },
    /// Clear the sender's private notes.
    AckNotes,
    Ready,
    /// Host only: relist and start a new game with the same traders.
    Restart,
}

impl MarketIntent {
    fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::TakeLoan(_) => "take a loan",
            Self::Buy { .. } => "buy",
            Self::Sell { .. } => "sell",
            Self::Tag { .. } => "tag",
            Self::Whisper { .. } => "whisper",
            Self::Emoji { .. } => "emoji",
            Self::AckNotes => "acknowledge notes",
            Self::Ready => "ready",
            Self::Restart => "restart",
        }
    }

    fn accepted_in(&self) -> &'static [MarketStatus] {
        use MarketStatus::*;
        match self {
            Self::Start => &[Waiting],
            Self::TakeLoan(_) => &[Borrowing],
            Self::Buy { .. } | Self::Sell { .. } | Self::Tag { .. } | Self::Ready => &[Playing],
            Self::Whisper { .. } | Self::Emoji { .. } | Self::AckNotes => {
                &[Waiting, Borrowing, Playing, Over]
            }
            Self::Restart => &[Borrowing, Playing, Over],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarketOutcome {
    Started,
    /// `trading_open` is set when this loan was the last one missing.
    Borrowed { trading_open: bool },
    Bought { cost: f64 },
    Sold { proceeds: f64 },
    Tagged { impact: f64 },
    Delivered,
    NotesCleared,
    /// `resolved` is set when this ready closed the round.
    Ready { resolved: Option<RoundSummary> },
    Restarted { max_rounds: u32 },
}

/// The market rules plus the content they list and report.
#[derive(Clone)]
pub struct MarketEngine {
    settings: MarketSettings,
    listings: Arc<dyn ListingSource>,
    events: Arc<dyn EventSource>,
}

impl Default for MarketEngine {
    fn default() -> Self {
        Self::new(MarketSettings::default())
    }
}

impl fmt::Debug for MarketEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl MarketEngine {
    pub fn new(settings: MarketSettings) -> Self {
        Self::with_content(settings, Arc::new(NameTable), Arc::new(EventDeck))
    }

    pub fn with_content(
        settings: MarketSettings,
        listings: Arc<dyn ListingSource>,
        events: Arc<dyn EventSource>,
    ) -> Self {
        Self {
            settings,
            listings,
            events,
        }
    }

    pub fn settings(&self) -> &MarketSettings {
        &self.settings
    }

    /// Seats a newcomer at the first free seat (never taken, or left).
    ///
    /// Run it inside a room transaction
    /// ([`EngineRunner::run`](crate::EngineRunner::run)) so two
    /// newcomers cannot take the same seat.
    pub fn admit(&self, room: &mut MarketRoom, now: u64) -> Result<MarketSeat, Rejection> {
        if !room.status.is_joinable() {
            return Err(Rejection::WrongStatus {
                status: room.status.to_string(),
                intent: "join",
            });
        }
        if room.active_count() >= usize::from(room.max_players) {
            return Err(Rejection::unmet("the table is full"));
        }
        let seat = (1..=room.max_players.min(MAX_TRADERS))
            .map(MarketSeat)
            .find(|seat| room.players.get(seat).is_none_or(|t| t.left))
            .ok_or_else(|| Rejection::unmet("the table is full"))?;
        room.players
            .insert(seat, Trader::fresh(room.stocks.len(), now));
        Ok(seat)
    }

    /// Draws a fresh set of stocks and a game length.
    fn list_market(&self, rng: &mut StdRng) -> (Vec<Stock>, u32) {
        let s = &self.settings;
        let max_rounds = s.min_rounds + rng.random_range(0..=s.extra_rounds);
        let buy_limit = (f64::from(max_rounds) * s.buy_limit_share).floor() as u32;
        let stocks = self
            .listings
            .listings(s.listings, rng)
            .into_iter()
            .map(|listing| {
                let price = round_cents(s.open_price + rng.random::<f64>() * s.open_price_span);
                Stock::list(listing, price, buy_limit)
            })
            .collect();
        (stocks, max_rounds)
    }

    fn host_only(seat: MarketSeat, intent: &MarketIntent) -> Result<(), Rejection> {
        if seat.is_host() {
            Ok(())
        } else {
            Err(Rejection::NotPermitted {
                seat: seat.to_string(),
                action: intent.name(),
            })
        }
    }

    fn open_trading(room: &mut MarketRoom, now: u64) -> Result<(), Rejection> {
        advance(&mut room.status, MarketStatus::Playing)?;
        room.round_start_time = now;
        for trader in room.players.values_mut() {
            trader.ready = false;
        }
        Ok(())
    }

    fn resolve(
        &self,
        room: &mut MarketRoom,
        ctx: &mut EngineCtx<'_>,
    ) -> Result<RoundSummary, Rejection> {
        resolve::resolve_round(room, &self.settings, self.events.as_ref(), ctx)
    }

    /// The sender's trader, refused once they have left the table.
    fn seated_trader(room: &mut MarketRoom, seat: MarketSeat) -> Result<&mut Trader, Rejection> {
        let trader = room.trader_mut(seat)?;
        if trader.left {
            return Err(Rejection::unmet(format!("{seat} has left the table")));
        }
        Ok(trader)
    }

    fn active_trader(room: &mut MarketRoom, seat: MarketSeat) -> Result<&mut Trader, Rejection> {
        let trader = Self::seated_trader(room, seat)?;
        if trader.is_bankrupt {
            return Err(Rejection::unmet("bankrupt traders cannot trade"));
        }
        Ok(trader)
    }
}

impl TurnEngine for MarketEngine {
    type Seat = MarketSeat;
    type Room = MarketRoom;
    type Setup = MarketSetup;
    type Intent = MarketIntent;
    type Outcome = MarketOutcome;

    const NAMESPACE: Namespace = STOCK_ROOMS;
    const SEATS: &'static [&'static str] = &["P1", "P2", "P3", "P4", "P5", "P6", "P7", "P8"];

    fn open(
        &self,
        host: MarketSeat,
        setup: MarketSetup,
        ctx: &mut EngineCtx<'_>,
    ) -> Result<MarketRoom, Rejection> {
        if !host.is_host() {
            return Err(Rejection::NotPermitted {
                seat: host.to_string(),
                action: "create a room",
            });
        }
        if !(1..=MAX_TRADERS).contains(&setup.max_players) {
            return Err(Rejection::invalid(format!(
                "table size must be 1..={MAX_TRADERS}"
            )));
        }
        let [min, max] = setup.loan_range;
        if max <= min {
            return Err(Rejection::invalid(format!(
                "loan ceiling {max} must exceed the floor {min}"
            )));
        }

        let (stocks, max_rounds) = self.list_market(ctx.rng);
        let mut events = Vec::new();
        if ctx.rng.random_bool(self.settings.event_chance.clamp(0.0, 1.0)) {
            events.extend(self.events.draw(&stocks, 1, ctx.rng));
        }
        let mut room = MarketRoom {
            max_rounds,
            max_players: setup.max_players,
            config: MarketConfig {
                loan_range: setup.loan_range,
            },
            events,
            created_at: ctx.now,
            last_active: ctx.now,
            round_start_time: ctx.now,
            ..MarketRoom::default()
        };
        room.players
            .insert(host, Trader::fresh(stocks.len(), ctx.now));
        room.stocks = stocks;
        Ok(room)
    }

    fn seat_payload(&self, _seat: MarketSeat, now: u64) -> Value {
        json!({ "joinedAt": now, "ready": false })
    }

    fn precheck(&self, intent: &MarketIntent) -> Result<(), Rejection> {
        match intent {
            MarketIntent::TakeLoan(0) => Err(Rejection::invalid("loan must be positive")),
            MarketIntent::Buy { quantity: 0, .. } | MarketIntent::Sell { quantity: 0, .. } => {
                Err(Rejection::invalid("quantity must be positive"))
            }
            MarketIntent::Tag { stake: 0, .. } => Err(Rejection::invalid("stake must be positive")),
            MarketIntent::Whisper { text, .. } if text.trim().is_empty() => {
                Err(Rejection::invalid("whisper is empty"))
            }
            MarketIntent::Emoji { emoji, .. } if emoji.trim().is_empty() => {
                Err(Rejection::invalid("emoji is empty"))
            }
            _ => Ok(()),
        }
    }

    fn apply(
        &self,
        room: &mut MarketRoom,
        seat: MarketSeat,
        intent: &MarketIntent,
        ctx: &mut EngineCtx<'_>,
    ) -> Result<MarketOutcome, Rejection> {
        require_status(&room.status, intent.accepted_in(), intent.name())?;

        match intent {
            MarketIntent::Start => {
                Self::host_only(seat, intent)?;
                if room.max_players > 1 && room.active_count() < usize::from(room.max_players) {
                    return Err(Rejection::unmet(format!(
                        "waiting for {} traders to join",
                        room.max_players
                    )));
                }
                advance(&mut room.status, MarketStatus::Borrowing)?;
                for trader in room.players.values_mut() {
                    trader.ready = false;
                }
                Ok(MarketOutcome::Started)
            }
            MarketIntent::TakeLoan(amount) => {
                let [min, max] = room.config.loan_range;
                if !(min..=max).contains(amount) {
                    return Err(Rejection::invalid(format!(
                        "loan must be between {min} and {max}"
                    )));
                }
                let trader = room.trader_mut(seat)?;
                if trader.ready {
                    return Err(Rejection::unmet("loan already taken"));
                }
                trader.cash = *amount as f64;
                trader.loan = *amount as f64;
                trader.ready = true;

                let trading_open = room.everyone_ready();
                if trading_open {
                    Self::open_trading(room, ctx.now)?;
                }
                Ok(MarketOutcome::Borrowed { trading_open })
            }
            MarketIntent::Buy { stock, quantity } => {
                Self::seated_trader(room, seat)?;
                room.check_buy(seat, *stock)?;
                let cost = *quantity as f64 * room.stock(*stock)?.price;
                let trader = Self::active_trader(room, seat)?;
                if cost > trader.cash {
                    return Err(Rejection::InsufficientFunds {
                        need: cost,
                        have: trader.cash,
                    });
                }
                trader.cash -= cost;
                *trader.holding_mut(*stock) += quantity;
                *room.turn_buys.entry(*stock).or_default() += cost;
                Ok(MarketOutcome::Bought { cost })
            }
            MarketIntent::Sell { stock, quantity } => {
                let listed = room.stock(*stock)?;
                let (name, price) = (listed.name.clone(), listed.price);
                let trader = Self::active_trader(room, seat)?;
                let held = trader.holding(*stock);
                if held < *quantity {
                    return Err(Rejection::unmet(format!("only {held} shares of {name} held")));
                }
                let proceeds = *quantity as f64 * price;
                *trader.holding_mut(*stock) -= quantity;
                trader.pending_cash += proceeds;
                Ok(MarketOutcome::Sold { proceeds })
            }
            MarketIntent::Tag {
                stock,
                stake,
                bullish,
            } => {
                let listed = room.stock(*stock)?;
                let name = listed.name.clone();
                let cap = listed.market_cap();
                let min_stake = (cap * self.settings.tag_min_stake).floor();
                let stake = *stake as f64;
                if stake < min_stake {
                    return Err(Rejection::unmet(format!(
                        "tagging {name} takes at least {min_stake}"
                    )));
                }
                let trader = Self::active_trader(room, seat)?;
                if stake > trader.cash {
                    return Err(Rejection::InsufficientFunds {
                        need: stake,
                        have: trader.cash,
                    });
                }
                trader.cash -= stake;

                let ratio = if cap > 0.0 { stake / cap } else { f64::INFINITY };
                let magnitude = tag_impact(ratio);
                let impact = if *bullish { magnitude } else { -magnitude };
                *room.active_tags.entry(*stock).or_default() += impact;
                room.events.push(MarketEvent {
                    id: format!("tag_{stock}_{}_{}", room.round, room.events.len()),
                    message: format!(
                        "{seat} puts {stake:.0} {} {name}",
                        if *bullish { "behind" } else { "against" }
                    ),
                    impact: None,
                    duration: 1,
                    target: EventTarget::Headline,
                    limit_change: None,
                    kind: EventKind::Tag,
                });
                Ok(MarketOutcome::Tagged { impact })
            }
            MarketIntent::Whisper { to, text } => {
                if *to == seat {
                    return Err(Rejection::invalid("cannot whisper to yourself"));
                }
                room.trader_mut(*to)?.whisper = Some(Whisper {
                    from: seat,
                    text: text.clone(),
                    time: ctx.now,
                });
                Ok(MarketOutcome::Delivered)
            }
            MarketIntent::Emoji { to, emoji } => {
                room.trader_mut(*to)?.emoji = Some(Reaction {
                    from: seat,
                    emoji: emoji.clone(),
                    time: ctx.now,
                });
                Ok(MarketOutcome::Delivered)
            }
            MarketIntent::AckNotes => {
                room.private_notes.remove(&seat);
                Ok(MarketOutcome::NotesCleared)
            }
            MarketIntent::Ready => {
                Self::seated_trader(room, seat)?.ready = true;
                let resolved = if room.everyone_ready() {
                    Some(self.resolve(room, ctx)?)
                } else {
                    None
                };
                Ok(MarketOutcome::Ready { resolved })
            }
            MarketIntent::Restart => {
                Self::host_only(seat, intent)?;
                advance(&mut room.status, MarketStatus::Borrowing)?;
                let (stocks, max_rounds) = self.list_market(ctx.rng);
                for trader in room.players.values_mut() {
                    trader.reset(stocks.len());
                }
                room.stocks = stocks;
                room.max_rounds = max_rounds;
                room.round = 1;
                room.round_start_time = ctx.now;
                room.events.clear();
                room.sector_performance.clear();
                room.turn_buys.clear();
                room.active_tags.clear();
                Ok(MarketOutcome::Restarted { max_rounds })
            }
        }
    }

    /// A trader who leaves mid-phase may have been the last one the
    /// others were waiting on: open trading, or close the round.
    fn settle(
        &self,
        room: &mut MarketRoom,
        ctx: &mut EngineCtx<'_>,
    ) -> Result<Option<MarketOutcome>, Rejection> {
        if !room.everyone_ready() {
            return Ok(None);
        }
        match room.status {
            MarketStatus::Borrowing => {
                Self::open_trading(room, ctx.now)?;
                Ok(Some(MarketOutcome::Borrowed { trading_open: true }))
            }
            MarketStatus::Playing => Ok(Some(MarketOutcome::Ready {
                resolved: Some(self.resolve(room, ctx)?),
            })),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::SeedableRng;
    use roomlink_protocol::{Codec, JsonCodec};

    // =====================================================================
    // Helpers
    // =====================================================================

    pub(crate) fn quiet_settings() -> MarketSettings {
        MarketSettings {
            event_chance: 0.0,
            ..MarketSettings::default()
        }
    }

    pub(crate) fn seat(n: u8) -> MarketSeat {
        MarketSeat::new(n).unwrap()
    }

    /// Two stocks in different sectors, two traders, trading open.
    pub(crate) fn playing_room() -> MarketRoom {
        let stock = |name: &str, sector: &str, price: f64| Stock {
            name: name.into(),
            sector: sector.into(),
            price,
            shares: 100_000,
            history: vec![price],
            buy_limit_round: 15,
            ..Stock::default()
        };
        let mut room = MarketRoom {
            status: MarketStatus::Playing,
            max_players: 2,
            stocks: vec![stock("Apex Power", "Energy", 40.0), stock("Nova Bank", "Finance", 25.0)],
            ..MarketRoom::default()
        };
        for n in 1..=2 {
            let mut trader = Trader::fresh(2, 0);
            trader.cash = 100_000.0;
            trader.loan = 100_000.0;
            room.players.insert(seat(n), trader);
        }
        room
    }

    fn apply(
        room: &mut MarketRoom,
        from: MarketSeat,
        intent: MarketIntent,
    ) -> Result<MarketOutcome, Rejection> {
        let mut rng = StdRng::seed_from_u64(5);
        let engine = MarketEngine::new(quiet_settings());
        engine.precheck(&intent)?;
        engine.apply(room, from, &intent, &mut EngineCtx::new(1_000, &mut rng))
    }

    fn lobby(max_players: u8) -> MarketRoom {
        let mut rng = StdRng::seed_from_u64(1);
        MarketEngine::new(quiet_settings())
            .open(
                MarketSeat::HOST,
                MarketSetup {
                    max_players,
                    ..MarketSetup::default()
                },
                &mut EngineCtx::new(10, &mut rng),
            )
            .unwrap()
    }

    // =====================================================================
    // Seats
    // =====================================================================

    #[test]
    fn test_seat_labels() {
        assert_eq!(seat(3).to_string(), "P3");
        assert_eq!("P8".parse::<MarketSeat>().unwrap(), seat(8));
        assert!("P9".parse::<MarketSeat>().is_err());
        assert!("P0".parse::<MarketSeat>().is_err());
        assert!("A".parse::<MarketSeat>().is_err());
    }

    #[test]
    fn test_players_keyed_by_label() {
        let room = lobby(2);
        let v = JsonCodec.encode(&room).unwrap();
        assert_eq!(v["players"]["P1"]["left"], false);
        let back: MarketRoom = JsonCodec.decode(&v).unwrap();
        assert_eq!(back, room);
    }

    // =====================================================================
    // Lobby
    // =====================================================================

    #[test]
    fn test_open_lists_market() {
        let room = lobby(4);
        assert_eq!(room.stocks.len(), 10);
        assert!((20..=30).contains(&room.max_rounds));
        for s in &room.stocks {
            assert!(s.price >= 20.0 && s.price <= 50.0);
            assert_eq!(s.history, vec![s.price]);
            assert_eq!(s.buy_limit_round, (f64::from(room.max_rounds) * 0.75).floor() as u32);
        }
        assert_eq!(room.status, MarketStatus::Waiting);
        assert_eq!(room.trader(MarketSeat::HOST).unwrap().holdings, vec![0; 10]);
    }

    #[test]
    fn test_open_validates_setup() {
        let mut rng = StdRng::seed_from_u64(1);
        let engine = MarketEngine::default();
        let mut ctx = EngineCtx::new(0, &mut rng);
        let bad_range = MarketSetup {
            loan_range: [1_000, 1_000],
            ..MarketSetup::default()
        };
        assert!(matches!(
            engine.open(MarketSeat::HOST, bad_range, &mut ctx),
            Err(Rejection::Invalid(_))
        ));
        let too_big = MarketSetup {
            max_players: 9,
            ..MarketSetup::default()
        };
        assert!(engine.open(MarketSeat::HOST, too_big, &mut ctx).is_err());
        assert!(engine.open(seat(2), MarketSetup::default(), &mut ctx).is_err());
    }

    #[test]
    fn test_admit_fills_first_free_seat() {
        let engine = MarketEngine::default();
        let mut room = lobby(3);
        assert_eq!(engine.admit(&mut room, 20).unwrap(), seat(2));
        assert_eq!(engine.admit(&mut room, 21).unwrap(), seat(3));
        assert_eq!(
            engine.admit(&mut room, 22),
            Err(Rejection::unmet("the table is full"))
        );

        room.players.get_mut(&seat(2)).unwrap().left = true;
        assert_eq!(engine.admit(&mut room, 23).unwrap(), seat(2));
        assert_eq!(room.trader(seat(2)).unwrap().joined_at, Some(23));
    }

    #[test]
    fn test_admit_only_while_waiting() {
        let engine = MarketEngine::default();
        let mut room = lobby(3);
        room.status = MarketStatus::Borrowing;
        assert!(matches!(
            engine.admit(&mut room, 0),
            Err(Rejection::WrongStatus { .. })
        ));
    }

    #[test]
    fn test_start_waits_for_full_table() {
        let engine = MarketEngine::default();
        let mut room = lobby(2);
        assert!(matches!(
            apply(&mut room, MarketSeat::HOST, MarketIntent::Start),
            Err(Rejection::Unmet(_))
        ));
        engine.admit(&mut room, 0).unwrap();
        assert!(matches!(
            apply(&mut room, seat(2), MarketIntent::Start),
            Err(Rejection::NotPermitted { .. })
        ));
        apply(&mut room, MarketSeat::HOST, MarketIntent::Start).unwrap();
        assert_eq!(room.status, MarketStatus::Borrowing);
    }

    #[test]
    fn test_single_player_starts_alone() {
        let mut room = lobby(1);
        apply(&mut room, MarketSeat::HOST, MarketIntent::Start).unwrap();
        assert_eq!(room.status, MarketStatus::Borrowing);
    }

    #[test]
    fn test_last_loan_opens_trading() {
        let engine = MarketEngine::default();
        let mut room = lobby(2);
        engine.admit(&mut room, 0).unwrap();
        apply(&mut room, MarketSeat::HOST, MarketIntent::Start).unwrap();

        assert!(matches!(
            apply(&mut room, seat(2), MarketIntent::TakeLoan(10)),
            Err(Rejection::Invalid(_))
        ));
        assert_eq!(
            apply(&mut room, seat(2), MarketIntent::TakeLoan(80_000)).unwrap(),
            MarketOutcome::Borrowed { trading_open: false }
        );
        assert!(apply(&mut room, seat(2), MarketIntent::TakeLoan(90_000)).is_err());
        assert_eq!(
            apply(&mut room, MarketSeat::HOST, MarketIntent::TakeLoan(50_000)).unwrap(),
            MarketOutcome::Borrowed { trading_open: true }
        );
        assert_eq!(room.status, MarketStatus::Playing);
        assert_eq!(room.round_start_time, 1_000);
        let p2 = room.trader(seat(2)).unwrap();
        assert_eq!((p2.cash, p2.loan, p2.ready), (80_000.0, 80_000.0, false));
    }

    // =====================================================================
    // Trading
    // =====================================================================

    #[test]
    fn test_buy_moves_cash_into_holdings() {
        let mut room = playing_room();
        let out = apply(&mut room, seat(1), MarketIntent::Buy { stock: 0, quantity: 100 }).unwrap();
        assert_eq!(out, MarketOutcome::Bought { cost: 4_000.0 });
        let p1 = room.trader(seat(1)).unwrap();
        assert_eq!(p1.cash, 96_000.0);
        assert_eq!(p1.holdings, vec![100, 0]);
        assert_eq!(room.turn_buys.get(&0), Some(&4_000.0));
    }

    #[test]
    fn test_buy_beyond_cash_is_refused() {
        let mut room = playing_room();
        let err = apply(&mut room, seat(1), MarketIntent::Buy { stock: 0, quantity: 5_000 })
            .unwrap_err();
        assert_eq!(
            err,
            Rejection::InsufficientFunds {
                need: 200_000.0,
                have: 100_000.0
            }
        );
    }

    #[test]
    fn test_buy_limit_round_and_events() {
        let mut room = playing_room();
        room.round = 13;
        assert!(room.can_buy(seat(1), 0));
        room.events.push(MarketEvent {
            id: "curb".into(),
            message: String::new(),
            impact: None,
            duration: 4,
            target: EventTarget::BuyLimit(Scope::Sector("Energy".into())),
            limit_change: Some(-4),
            kind: EventKind::News,
        });
        assert_eq!(room.buy_limit_round(0), 11);
        assert_eq!(room.buy_limit_round(1), 15);
        assert!(!room.can_buy(seat(1), 0));
        assert!(room.can_buy(seat(1), 1));
        assert!(matches!(
            apply(&mut room, seat(1), MarketIntent::Buy { stock: 0, quantity: 1 }),
            Err(Rejection::Unmet(_))
        ));
    }

    #[test]
    fn test_temp_ban_blocks_buying_not_selling() {
        let mut room = playing_room();
        room.players.get_mut(&seat(1)).unwrap().holdings = vec![0, 10];
        room.events.push(MarketEvent {
            id: "halt".into(),
            message: String::new(),
            impact: None,
            duration: 2,
            target: EventTarget::TempBan(Scope::Index(1)),
            limit_change: None,
            kind: EventKind::News,
        });
        assert!(room.is_suspended(1));
        assert!(apply(&mut room, seat(1), MarketIntent::Buy { stock: 1, quantity: 1 }).is_err());
        assert!(apply(&mut room, seat(1), MarketIntent::Sell { stock: 1, quantity: 10 }).is_ok());
    }

    #[test]
    fn test_sell_proceeds_wait_for_resolution() {
        let mut room = playing_room();
        apply(&mut room, seat(1), MarketIntent::Buy { stock: 1, quantity: 40 }).unwrap();
        let out = apply(&mut room, seat(1), MarketIntent::Sell { stock: 1, quantity: 30 }).unwrap();
        assert_eq!(out, MarketOutcome::Sold { proceeds: 750.0 });
        let p1 = room.trader(seat(1)).unwrap();
        assert_eq!(p1.cash, 99_000.0);
        assert_eq!(p1.pending_cash, 750.0);
        assert_eq!(p1.holdings[1], 10);
        assert!(matches!(
            apply(&mut room, seat(1), MarketIntent::Sell { stock: 1, quantity: 11 }),
            Err(Rejection::Unmet(_))
        ));
    }

    #[test]
    fn test_bankrupt_trader_cannot_trade() {
        let mut room = playing_room();
        room.players.get_mut(&seat(2)).unwrap().is_bankrupt = true;
        assert!(!room.can_buy(seat(2), 0));
        assert!(apply(&mut room, seat(2), MarketIntent::Buy { stock: 0, quantity: 1 }).is_err());
        assert!(apply(&mut room, seat(2), MarketIntent::Sell { stock: 0, quantity: 1 }).is_err());
    }

    #[test]
    fn test_tag_impact_tiers() {
        assert_eq!(tag_impact(0.0005), 0.03);
        assert_eq!(tag_impact(0.001), 0.08);
        assert_eq!(tag_impact(0.004), 0.08);
        assert_eq!(tag_impact(0.01), 0.18);
        assert_eq!(tag_impact(0.02), 0.35);
    }

    #[test]
    fn test_tag_spends_stake_and_records_pressure() {
        let mut room = playing_room();
        // cap = 100_000 * 40 = 4_000_000, minimum stake 2_000
        assert!(matches!(
            apply(&mut room, seat(1), MarketIntent::Tag { stock: 0, stake: 1_999, bullish: true }),
            Err(Rejection::Unmet(_))
        ));
        let out = apply(
            &mut room,
            seat(1),
            MarketIntent::Tag { stock: 0, stake: 40_000, bullish: false },
        )
        .unwrap();
        assert_eq!(out, MarketOutcome::Tagged { impact: -0.18 });
        assert_eq!(room.trader(seat(1)).unwrap().cash, 60_000.0);
        assert_eq!(room.active_tags.get(&0), Some(&-0.18));
        let headline = room.events.last().unwrap();
        assert_eq!(headline.kind, EventKind::Tag);
        assert_eq!(headline.duration, 1);
        assert_eq!(headline.multiplier_for(0, &room.stocks[0]), None);
    }

    // =====================================================================
    // Messages
    // =====================================================================

    #[test]
    fn test_whisper_and_emoji_land_on_target() {
        let mut room = playing_room();
        apply(
            &mut room,
            seat(1),
            MarketIntent::Whisper { to: seat(2), text: "sell Nova".into() },
        )
        .unwrap();
        apply(&mut room, seat(2), MarketIntent::Emoji { to: seat(1), emoji: "🚀".into() }).unwrap();
        let p2 = room.trader(seat(2)).unwrap();
        assert_eq!(
            p2.whisper,
            Some(Whisper { from: seat(1), text: "sell Nova".into(), time: 1_000 })
        );
        assert_eq!(room.trader(seat(1)).unwrap().emoji.as_ref().unwrap().emoji, "🚀");
        assert!(matches!(
            apply(&mut room, seat(1), MarketIntent::Whisper { to: seat(5), text: "hi".into() }),
            Err(Rejection::Unmet(_))
        ));
        assert!(matches!(
            apply(&mut room, seat(1), MarketIntent::Whisper { to: seat(2), text: "  ".into() }),
            Err(Rejection::Invalid(_))
        ));
    }

    #[test]
    fn test_ack_clears_only_own_notes() {
        let mut room = playing_room();
        room.private_notes.insert(seat(1), vec!["a".into()]);
        room.private_notes.insert(seat(2), vec!["b".into()]);
        apply(&mut room, seat(1), MarketIntent::AckNotes).unwrap();
        assert!(!room.private_notes.contains_key(&seat(1)));
        assert!(room.private_notes.contains_key(&seat(2)));
    }

    // =====================================================================
    // Ready / restart
    // =====================================================================

    #[test]
    fn test_ready_resolves_only_when_everyone_is_ready() {
        let mut room = playing_room();
        assert_eq!(
            apply(&mut room, seat(1), MarketIntent::Ready).unwrap(),
            MarketOutcome::Ready { resolved: None }
        );
        assert_eq!(room.round, 1);
        let MarketOutcome::Ready { resolved: Some(summary) } =
            apply(&mut room, seat(2), MarketIntent::Ready).unwrap()
        else {
            panic!("second ready should close the round");
        };
        assert_eq!(summary.round, 1);
        assert_eq!(room.round, 2);
        assert!(room.players.values().all(|t| !t.ready));
    }

    #[test]
    fn test_left_and_bankrupt_traders_do_not_hold_up_the_round() {
        let mut room = playing_room();
        room.players.insert(seat(3), Trader::default());
        room.players.get_mut(&seat(2)).unwrap().is_bankrupt = true;
        assert!(matches!(
            apply(&mut room, seat(1), MarketIntent::Ready).unwrap(),
            MarketOutcome::Ready { resolved: Some(_) }
        ));
    }

    #[test]
    fn test_left_trader_cannot_trade_or_ready() {
        let mut room = playing_room();
        {
            let p2 = room.players.get_mut(&seat(2)).unwrap();
            p2.holdings = vec![10, 0];
            p2.left = true;
        }
        for intent in [
            MarketIntent::Buy { stock: 0, quantity: 1 },
            MarketIntent::Sell { stock: 0, quantity: 1 },
            MarketIntent::Ready,
        ] {
            assert!(matches!(
                apply(&mut room, seat(2), intent),
                Err(Rejection::Unmet(_))
            ));
        }
        let p2 = room.trader(seat(2)).unwrap();
        assert_eq!((p2.cash, p2.holdings[0], p2.ready), (100_000.0, 10, false));
    }

    fn settle(room: &mut MarketRoom) -> Option<MarketOutcome> {
        let mut rng = StdRng::seed_from_u64(5);
        MarketEngine::new(quiet_settings())
            .settle(room, &mut EngineCtx::new(2_000, &mut rng))
            .unwrap()
    }

    #[test]
    fn test_settle_closes_round_the_leaver_held_up() {
        let mut room = playing_room();
        assert_eq!(settle(&mut room), None);
        apply(&mut room, seat(1), MarketIntent::Ready).unwrap();
        room.players.get_mut(&seat(2)).unwrap().left = true;

        assert!(matches!(
            settle(&mut room),
            Some(MarketOutcome::Ready { resolved: Some(_) })
        ));
        assert_eq!(room.round, 2);
        assert_eq!(room.round_start_time, 2_000);
        // seat 1 is not ready for round 2 yet
        assert_eq!(settle(&mut room), None);
    }

    #[test]
    fn test_settle_opens_trading_when_last_borrower_leaves() {
        let mut room = lobby(2);
        let engine = MarketEngine::new(quiet_settings());
        let guest = engine.admit(&mut room, 20).unwrap();
        apply(&mut room, seat(1), MarketIntent::Start).unwrap();
        assert_eq!(
            apply(&mut room, seat(1), MarketIntent::TakeLoan(100_000)).unwrap(),
            MarketOutcome::Borrowed { trading_open: false }
        );
        room.players.get_mut(&guest).unwrap().left = true;

        assert_eq!(
            settle(&mut room),
            Some(MarketOutcome::Borrowed { trading_open: true })
        );
        assert_eq!(room.status, MarketStatus::Playing);
        assert!(!room.trader(seat(1)).unwrap().ready);
    }

    #[test]
    fn test_restart_relists_and_resets_books() {
        let mut room = playing_room();
        room.status = MarketStatus::Over;
        room.round = 25;
        room.players.get_mut(&seat(2)).unwrap().is_bankrupt = true;
        assert!(matches!(
            apply(&mut room, seat(2), MarketIntent::Restart),
            Err(Rejection::NotPermitted { .. })
        ));
        let MarketOutcome::Restarted { max_rounds } =
            apply(&mut room, seat(1), MarketIntent::Restart).unwrap()
        else {
            panic!("host restart");
        };
        assert_eq!(room.status, MarketStatus::Borrowing);
        assert_eq!(room.round, 1);
        assert_eq!(room.max_rounds, max_rounds);
        assert_eq!(room.stocks.len(), 10);
        for trader in room.players.values() {
            assert_eq!((trader.cash, trader.loan, trader.is_bankrupt), (0.0, 0.0, false));
            assert_eq!(trader.holdings, vec![0; 10]);
            assert!(!trader.left);
        }
    }

    #[test]
    fn test_intents_checked_against_status() {
        let mut room = lobby(2);
        assert!(matches!(
            apply(&mut room, seat(1), MarketIntent::Buy { stock: 0, quantity: 1 }),
            Err(Rejection::WrongStatus { .. })
        ));
        assert!(matches!(
            apply(&mut room, seat(1), MarketIntent::Ready),
            Err(Rejection::WrongStatus { .. })
        ));
    }

    #[test]
    fn test_event_target_shape() {
        let event = MarketEvent {
            id: "x".into(),
            message: "m".into(),
            impact: None,
            duration: 2,
            target: EventTarget::TempBan(Scope::Sector("Energy".into())),
            limit_change: None,
            kind: EventKind::News,
        };
        let v = JsonCodec.encode(&event).unwrap();
        assert_eq!(
            v["target"],
            json!({ "type": "tempBan", "value": { "type": "sector", "value": "Energy" } })
        );
        let all: EventTarget = serde_json::from_value(json!({ "type": "all" })).unwrap();
        assert_eq!(all, EventTarget::All);
    }
}
