use std::fmt;

use roomlink_protocol::{Codec, Path, ProtocolError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// One observed value of a subscribed path. `value` is `None` while the
/// path is absent (e.g. after the room was deleted).
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub value: Option<Value>,
}

impl Snapshot {
    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    /// Decodes the value, `Ok(None)` if the path is absent.
    pub fn decode<T: DeserializeOwned>(
        &self,
        codec: &impl Codec,
    ) -> Result<Option<T>, ProtocolError> {
        self.value.as_ref().map(|v| codec.decode(v)).transpose()
    }
}

/// A live stream of [`Snapshot`]s for one path.
///
/// The first snapshot is the value at subscribe time. Dropping the
/// subscription unsubscribes; the backend notices the closed channel on
/// its next change and forgets the subscriber.
pub struct Subscription {
    path: Path,
    rx: mpsc::UnboundedReceiver<Snapshot>,
}

impl Subscription {
    /// Wraps the receiving half of a backend's change channel.
    pub fn new(path: Path, rx: mpsc::UnboundedReceiver<Snapshot>) -> Self {
        Self { path, rx }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits for the next change. `None` once the backend has gone away.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    /// Returns an already-delivered snapshot without waiting.
    pub fn try_next(&mut self) -> Option<Snapshot> {
        self.rx.try_recv().ok()
    }

    /// Drains everything delivered so far and returns the newest snapshot.
    pub fn latest(&mut self) -> Option<Snapshot> {
        let mut last = None;
        while let Ok(snapshot) = self.rx.try_recv() {
            last = Some(snapshot);
        }
        last
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// DisconnectHook
// ---------------------------------------------------------------------------

/// Handle to an armed disconnect write.
///
/// Dropping the handle leaves the hook armed, like its hosted
/// counterparts; only [`cancel`](Self::cancel) revokes it. Wrap it in a
/// scoped owner (see the presence guard) when the hook must not outlive
/// the session.
pub struct DisconnectHook {
    path: Path,
    canceller: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl DisconnectHook {
    pub fn new(path: Path, canceller: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            path,
            canceller: Some(Box::new(canceller)),
        }
    }

    /// Path the patch would be merged into.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Revokes the hook. Harmless if it already fired.
    pub fn cancel(mut self) {
        if let Some(canceller) = self.canceller.take() {
            canceller();
        }
    }
}

impl fmt::Debug for DisconnectHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisconnectHook")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
