//! Valuation and standings.

use std::cmp::Ordering;

use super::{MarketRoom, MarketSeat, Stock, Trader};

/// Current value of everything `trader` holds.
pub fn holdings_value(trader: &Trader, stocks: &[Stock]) -> f64 {
    stocks
        .iter()
        .enumerate()
        .map(|(idx, stock)| trader.holding(idx) as f64 * stock.price)
        .sum()
}

/// Cash, unsettled proceeds and holdings, less the loan with interest.
pub fn net_worth(trader: &Trader, stocks: &[Stock], interest_rate: f64) -> f64 {
    trader.cash + trader.pending_cash + holdings_value(trader, stocks)
        - trader.loan * (1.0 + interest_rate)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub seat: MarketSeat,
    pub net_worth: f64,
    pub bankrupt: bool,
}

/// Active traders, richest first. Ties keep seat order.
pub fn leaderboard(room: &MarketRoom, interest_rate: f64) -> Vec<Standing> {
    let mut standings: Vec<Standing> = room
        .players
        .iter()
        .filter(|(_, t)| !t.left)
        .map(|(seat, t)| Standing {
            seat: *seat,
            net_worth: net_worth(t, &room.stocks, interest_rate),
            bankrupt: t.is_bankrupt,
        })
        .collect();
    standings.sort_by(|a, b| {
        b.net_worth
            .partial_cmp(&a.net_worth)
            .unwrap_or(Ordering::Equal)
    });
    standings
}
