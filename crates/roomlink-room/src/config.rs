use serde::{Deserialize, Serialize};

/// Configuration for a [`RoomDirectory`](crate::RoomDirectory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Counter draws to try before giving up on finding a free id. Each
    /// draw is one counter transaction plus one existence read.
    pub max_attempts: u32,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self { max_attempts: 200 }
    }
}
