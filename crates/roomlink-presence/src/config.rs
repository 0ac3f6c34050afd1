use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing of heartbeats and sweeps, and the idle limits rooms are held to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessConfig {
    /// How often a client in a room refreshes `lastActive`.
    pub heartbeat_interval: Duration,
    /// How often a client sweeps its namespace.
    pub sweep_interval: Duration,
    /// A room idle this long with every seat vacant is reported as expired
    /// rather than merely abandoned.
    pub soft_ttl: Duration,
    /// A room idle this long is deleted whatever its seats say.
    pub hard_ttl: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(60),
            soft_ttl: Duration::from_secs(30 * 60),
            hard_ttl: Duration::from_secs(120 * 60),
        }
    }
}
