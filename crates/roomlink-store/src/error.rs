use roomlink_protocol::Path;

use crate::ConnectionId;

/// Errors that can occur in the store layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The client has no connection to the store right now.
    #[error("{0} is offline")]
    Offline(ConnectionId),

    /// The backend refused or failed the operation.
    #[error("store unavailable at {path}: {reason}")]
    Unavailable { path: Path, reason: String },

    /// A transaction kept losing to concurrent writers.
    #[error("transaction at {path} gave up after {attempts} conflicting attempts")]
    Contention { path: Path, attempts: u32 },

    /// `update` was called with something other than a JSON object.
    #[error("patch for {0} must be a JSON object")]
    InvalidPatch(Path),
}

impl StoreError {
    /// `true` for failures that may succeed if simply tried again later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Offline(_) | Self::Unavailable { .. } | Self::Contention { .. }
        )
    }
}
