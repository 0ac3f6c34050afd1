//! Round resolution.
//!
//! Runs inside the transaction of the intent (or departure) that left
//! every active trader ready, so the whole resolution commits as one
//! write. Order of steps:
//!
//! 1. value every active trader before anything moves
//! 2. settle pending cash, then mark new bankruptcies
//! 3. move each price (events, tags, pumps, random walk), split stocks
//!    that leave the `[5, 200]` band, record history
//! 4. age events and maybe draw a new one
//! 5. open the next round, or end the game

use std::collections::BTreeMap;

use rand::Rng;
use rand::rngs::StdRng;

use super::report::{holdings_value, net_worth};
use super::{
    EventKind, EventSource, EventTarget, MarketEvent, MarketRoom, MarketSeat, MarketSettings,
    round_cents,
};
use crate::status::{MarketStatus, advance};
use crate::{EngineCtx, Rejection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    /// One share became two.
    Forward,
    /// Ten shares became one.
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub stock: usize,
    pub kind: SplitKind,
}

/// What a resolution did, for logging and the closing trader.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    /// The round that closed.
    pub round: u32,
    pub bankruptcies: Vec<MarketSeat>,
    pub splits: Vec<Split>,
    /// Stocks whose buying frenzy raised or extended a pump.
    pub pumps: Vec<usize>,
    pub new_event: Option<String>,
    pub game_over: bool,
}

/// Next price for a stock at `current` worth `cap` in total.
///
/// Smaller caps swing harder: volatility is scaled by
/// `clamp(stability_cap / cap, min_stability, 1)`. The walk is biased
/// upward by `drift` plus a slightly positive-centred draw, then every
/// multiplier is applied. Rounded to cents, never below `price_floor`.
pub fn simulate_price(
    current: f64,
    multipliers: &[f64],
    cap: f64,
    settings: &MarketSettings,
    rng: &mut StdRng,
) -> f64 {
    let stability = (settings.stability_cap / cap).clamp(settings.min_stability, 1.0);
    let swing = settings.volatility * stability;
    let change = (rng.random::<f64>() - 0.45) * 2.0 * swing;
    let product: f64 = multipliers.iter().product();
    let next = current * (1.0 + settings.drift + change) * product;
    round_cents(next).max(settings.price_floor)
}

pub(crate) fn resolve_round(
    room: &mut MarketRoom,
    settings: &MarketSettings,
    events: &dyn EventSource,
    ctx: &mut EngineCtx<'_>,
) -> Result<RoundSummary, Rejection> {
    let mut summary = RoundSummary {
        round: room.round,
        bankruptcies: Vec::new(),
        splits: Vec::new(),
        pumps: Vec::new(),
        new_event: None,
        game_over: false,
    };

    // 1. wealth before anything moves
    let active: Vec<MarketSeat> = room.active_seats().collect();
    let total_wealth: f64 = active
        .iter()
        .filter_map(|seat| room.players.get(seat))
        .map(|t| net_worth(t, &room.stocks, settings.interest_rate))
        .sum();
    let average_wealth = if active.is_empty() {
        0.0
    } else {
        total_wealth / active.len() as f64
    };

    // 2. settlement and bankruptcy
    for seat in &active {
        let Some(trader) = room.players.get_mut(seat) else {
            continue;
        };
        trader.cash += trader.pending_cash;
        trader.pending_cash = 0.0;
        if trader.is_bankrupt {
            continue;
        }
        let held = holdings_value(trader, &room.stocks);
        if trader.cash <= 0.0 && held < trader.loan * settings.bankruptcy_ratio {
            trader.is_bankrupt = true;
            summary.bankruptcies.push(*seat);
        }
    }

    // 3. prices
    let mut sector_moves: BTreeMap<String, (f64, u32)> = BTreeMap::new();
    for idx in 0..room.stocks.len() {
        let stock = &room.stocks[idx];
        let old = stock.price;
        let cap = stock.market_cap();

        let mut multipliers: Vec<f64> = room
            .events
            .iter()
            .filter_map(|e| e.multiplier_for(idx, stock))
            .collect();
        if let Some(tag) = room.active_tags.get(&idx).filter(|t| **t != 0.0) {
            multipliers.push(1.0 + tag);
        }

        let bought = room.turn_buys.get(&idx).copied().unwrap_or(0.0);
        let threshold = if cap > average_wealth * settings.large_cap_factor {
            settings.large_cap_pump_threshold
        } else {
            settings.pump_threshold
        };
        if total_wealth > 0.0 && bought / total_wealth >= threshold {
            raise_pump(room, idx, settings);
            summary.pumps.push(idx);
        }

        let next = simulate_price(old, &multipliers, cap, settings, ctx.rng);
        if old > 0.0 {
            let sector = room.stocks[idx].sector.clone();
            let entry = sector_moves.entry(sector).or_insert((0.0, 0));
            entry.0 += (next - old) / old;
            entry.1 += 1;
        }

        let price = if next > settings.split_above {
            forward_split(room, idx, next);
            summary.splits.push(Split { stock: idx, kind: SplitKind::Forward });
            room.stocks[idx].price
        } else if next < settings.reverse_split_below {
            reverse_split(room, idx, next);
            summary.splits.push(Split { stock: idx, kind: SplitKind::Reverse });
            room.stocks[idx].price
        } else {
            room.stocks[idx].price = next;
            next
        };

        let history = &mut room.stocks[idx].history;
        history.push(price);
        if history.len() > settings.history_len {
            let excess = history.len() - settings.history_len;
            history.drain(..excess);
        }
    }
    room.sector_performance = sector_moves
        .into_iter()
        .map(|(sector, (sum, n))| (sector, sum / f64::from(n)))
        .collect();

    // 4. events
    room.events.retain_mut(|e| {
        e.duration = e.duration.saturating_sub(1);
        e.duration > 0
    });
    if ctx.rng.random_bool(settings.event_chance.clamp(0.0, 1.0)) {
        if let Some(event) = events.draw(&room.stocks, room.round, ctx.rng) {
            summary.new_event = Some(event.message.clone());
            room.events.push(event);
        }
    }

    // 5. next round
    room.active_tags.clear();
    room.turn_buys.clear();
    room.round += 1;
    room.round_start_time = ctx.now;
    for trader in room.players.values_mut() {
        trader.ready = false;
    }
    if room.round > room.max_rounds {
        advance(&mut room.status, MarketStatus::Over)?;
        summary.game_over = true;
    }
    Ok(summary)
}

/// Extends a running pump on `idx`, or starts one.
fn raise_pump(room: &mut MarketRoom, idx: usize, settings: &MarketSettings) {
    let running = room
        .events
        .iter_mut()
        .find(|e| e.kind == EventKind::Pump && e.target == EventTarget::Index(idx));
    match running {
        Some(pump) => pump.duration += settings.pump_extension,
        None => {
            let name = &room.stocks[idx].name;
            room.events.push(MarketEvent {
                id: format!("pump_{idx}_{}", room.round),
                message: format!("A buying frenzy grips {name}."),
                impact: Some(settings.pump_impact),
                duration: settings.pump_duration,
                target: EventTarget::Index(idx),
                limit_change: None,
                kind: EventKind::Pump,
            });
        }
    }
}

/// Halves the price at `next`, doubling shares and every holding.
fn forward_split(room: &mut MarketRoom, idx: usize, next: f64) {
    let stock = &mut room.stocks[idx];
    stock.price = round_cents(next / 2.0);
    stock.shares *= 2;
    let name = stock.name.clone();

    for (seat, trader) in room.players.iter_mut() {
        let held = trader.holding(idx);
        if held == 0 {
            continue;
        }
        *trader.holding_mut(idx) = held * 2;
        room.private_notes.entry(*seat).or_default().push(format!(
            "{name} split 2-for-1: your {held} shares are now {}.",
            held * 2
        ));
    }
}

/// Multiplies the price at `next` by ten, dividing shares and holdings.
/// Odd shares that no longer make a whole one are paid out at `next`.
fn reverse_split(room: &mut MarketRoom, idx: usize, next: f64) {
    let stock = &mut room.stocks[idx];
    stock.price = round_cents(next * 10.0);
    stock.shares /= 10;
    let name = stock.name.clone();

    for (seat, trader) in room.players.iter_mut() {
        let held = trader.holding(idx);
        if held == 0 {
            continue;
        }
        let (kept, odd) = (held / 10, held % 10);
        let payout = round_cents(odd as f64 * next);
        *trader.holding_mut(idx) = kept;
        trader.cash += payout;
        room.private_notes.entry(*seat).or_default().push(format!(
            "{name} consolidated 10-to-1: your {held} shares are now {kept}; \
             {odd} odd shares paid out {payout:.2}."
        ));
    }
}
