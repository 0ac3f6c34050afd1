use std::time::Duration;

/// A fixed wall-clock window starting at a shared timestamp.
///
/// Every client computes the same remaining time from the room's
/// `roundStartTime`, so no client needs to own the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundClock {
    started_at: u64,
    window: Duration,
}

impl RoundClock {
    /// The default market round window.
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(30);

    pub fn new(started_at_millis: u64, window: Duration) -> Self {
        Self {
            started_at: started_at_millis,
            window,
        }
    }

    pub fn started_at(&self) -> u64 {
        self.started_at
    }

    /// Epoch millis at which the round is up.
    pub fn deadline(&self) -> u64 {
        self.started_at
            .saturating_add(self.window.as_millis() as u64)
    }

    /// Time left at `now_millis`, zero once expired.
    pub fn remaining(&self, now_millis: u64) -> Duration {
        Duration::from_millis(self.deadline().saturating_sub(now_millis))
    }

    /// Whole seconds left, rounded up, as a countdown would display them.
    pub fn seconds_left(&self, now_millis: u64) -> u64 {
        self.remaining(now_millis).as_millis().div_ceil(1000) as u64
    }

    pub fn is_expired(&self, now_millis: u64) -> bool {
        now_millis >= self.deadline()
    }
}
