//! Periodic scheduling for Roomlink.
//!
//! Everything that runs "every N seconds" (room heartbeats, idle-room
//! sweeps) or "once, when the round is up" (the market countdown) is
//! driven from here:
//!
//! - [`Ticker`] fires at a fixed period, skipping ticks a slow job
//!   overran, after a random start offset.
//! - [`PeriodicTask`] owns a spawned loop around a `Ticker` and aborts it
//!   when dropped, so a job can never outlive the view that started it.
//! - [`Countdown`] runs a job once after a delay, also aborted on drop.
//! - [`RoundClock`] is the pure arithmetic of a wall-clock round window
//!   anchored at a shared `roundStartTime`.
//!
//! All waiting uses `tokio::time`, so tests can run with paused time.

mod round;
mod task;

pub use round::RoundClock;
pub use task::{Countdown, PeriodicTask};

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickConfig {
    /// Time between ticks. `Duration::ZERO` means the ticker never fires.
    pub period: Duration,
    /// Random extra delay (0..=max) before the first tick, so many
    /// clients started together do not all hit the store in the same
    /// instant.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period: Duration::ZERO,
            initial_jitter: Duration::from_millis(250),
        }
    }
}

impl TickConfig {
    /// A config that fires every `period`.
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        self.period.is_zero()
    }

    /// A draw from `0..=initial_jitter` in whole microseconds.
    fn draw_jitter(&self) -> Duration {
        let max = u64::try_from(self.initial_jitter.as_micros()).unwrap_or(u64::MAX);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::rng().random_range(0..=max))
    }
}

/// Information about one fired tick.
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// `true` if the tick fired more than 10% of a period late.
    pub overrun: bool,
    /// Whole periods missed because of the overrun. They are not made up.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Fixed-period tick source.
///
/// When a tick fires late (the previous job overran, or the runtime was
/// busy) the missed ticks are skipped and the cadence restarts from now.
pub struct Ticker {
    config: TickConfig,
    tick_count: u64,
    next_tick: Option<Instant>,
}

impl Ticker {
    pub fn new(config: TickConfig) -> Self {
        let next_tick =
            (!config.is_idle()).then(|| Instant::now() + config.period + config.draw_jitter());

        debug!(period = ?config.period, "ticker created");

        Self {
            config,
            tick_count: 0,
            next_tick,
        }
    }

    pub fn every(period: Duration) -> Self {
        Self::new(TickConfig::every(period))
    }

    /// Waits until the next tick is due.
    ///
    /// Pends forever when the period is zero, so it is safe to use as a
    /// `tokio::select!` branch.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(next) = self.next_tick else {
            return std::future::pending().await;
        };
        let period = self.config.period;

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > period / 10;
        let ticks_skipped = if overrun {
            (late_by.as_nanos() / period.as_nanos()) as u64
        } else {
            0
        };
        if ticks_skipped > 0 {
            warn!(tick = self.tick_count, skipped = ticks_skipped, "tick overrun, skipping ahead");
        }
        self.next_tick = Some(now + period);

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn period(&self) -> Duration {
        self.config.period
    }
}
