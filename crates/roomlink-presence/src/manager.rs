//! The presence manager: seat online/offline, heartbeats, cleanup and
//! sweeps for one store connection.

use std::sync::Arc;

use futures_util::future::join_all;
use roomlink_protocol::{Clock, Codec, JsonCodec, Namespace, RoomId, RoomMeta, SystemClock};
use roomlink_store::{DocumentStore, StoreError, TxDecision};
use roomlink_tick::{PeriodicTask, TickConfig};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::sweep::{SweepReport, SweepVerdict, sweep_verdict};
use crate::{LivenessConfig, PresenceError, PresenceGuard};

/// Result of [`PresenceManager::cleanup_if_all_left`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Every listed seat was vacant; the room is gone now.
    Deleted,
    /// There was no room to delete (someone else got there first).
    AlreadyGone,
    /// At least one listed seat is still held; nothing was changed.
    Occupied,
}

/// Keeps seats and rooms honest for one client.
///
/// Cheap to clone: the store connection and clock are shared.
#[derive(Clone)]
pub struct PresenceManager<S> {
    store: S,
    clock: Arc<dyn Clock>,
    config: LivenessConfig,
}

impl<S: DocumentStore + Clone> PresenceManager<S> {
    /// A manager using the system clock and default timings.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), LivenessConfig::default())
    }

    pub fn with_clock(store: S, clock: Arc<dyn Clock>, config: LivenessConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    // -----------------------------------------------------------------------
    // Presence
    // -----------------------------------------------------------------------

    /// Marks `seat` online and arms `offline_patch` for when this
    /// connection is lost.
    ///
    /// The hook is armed before the online write, so there is no window
    /// in which the seat reads online without a hook behind it. If the
    /// online write fails the hook is disarmed again.
    pub async fn attach(
        &self,
        namespace: &Namespace,
        room_id: RoomId,
        seat: &str,
        online_patch: Value,
        offline_patch: Value,
    ) -> Result<PresenceGuard, PresenceError> {
        if !online_patch.is_object() || !offline_patch.is_object() {
            return Err(PresenceError::InvalidPatch {
                seat: seat.to_string(),
            });
        }
        let path = namespace.seat_path(room_id, seat);

        let hook = self.store.on_disconnect(&path, offline_patch).await?;
        let guard = PresenceGuard::new(namespace.clone(), room_id, seat.to_string(), hook);

        // On failure the guard drops here and disarms the hook.
        self.store.update(&path, online_patch).await?;

        debug!(%namespace, room_id = %room_id, seat, "presence attached");
        Ok(guard)
    }

    // -----------------------------------------------------------------------
    // Heartbeat
    // -----------------------------------------------------------------------

    /// Refreshes the room's `lastActive`. Best effort: failures are logged
    /// and swallowed.
    pub async fn heartbeat(&self, namespace: &Namespace, room_id: RoomId) {
        let patch = json!({ "lastActive": self.clock.now_millis() });
        if let Err(e) = self.store.update(&namespace.room_path(room_id), patch).await {
            debug!(%namespace, room_id = %room_id, error = %e, "heartbeat failed");
        }
    }

    /// Heartbeats the room every `heartbeat_interval` until the returned
    /// task is dropped.
    pub fn spawn_heartbeat(&self, namespace: &Namespace, room_id: RoomId) -> PeriodicTask {
        let this = self.clone();
        let namespace = namespace.clone();
        PeriodicTask::spawn(
            "heartbeat",
            TickConfig::every(self.config.heartbeat_interval),
            move |_| {
                let this = this.clone();
                let namespace = namespace.clone();
                async move { this.heartbeat(&namespace, room_id).await }
            },
        )
    }

    // -----------------------------------------------------------------------
    // Cleanup
    // -----------------------------------------------------------------------

    /// Deletes the room iff every seat in `seats` is vacant. A seat absent
    /// from the document counts as vacant.
    ///
    /// The check and the delete are one transaction, so a seat claimed in
    /// between keeps the room alive. Calling this again after a deletion
    /// reports [`CleanupOutcome::AlreadyGone`].
    pub async fn cleanup_if_all_left(
        &self,
        namespace: &Namespace,
        room_id: RoomId,
        seats: &[&str],
    ) -> Result<CleanupOutcome, PresenceError> {
        let outcome = self
            .store
            .transact(&namespace.room_path(room_id), |cur| {
                let Some(doc) = cur else {
                    return TxDecision::Abort;
                };
                match JsonCodec.decode::<RoomMeta>(doc) {
                    Ok(meta) if meta.all_left(seats.iter().copied()) => {
                        TxDecision::Commit(Value::Null)
                    }
                    _ => TxDecision::Abort,
                }
            })
            .await?;

        let result = match (outcome.committed, outcome.value) {
            (true, _) => CleanupOutcome::Deleted,
            (false, None) => CleanupOutcome::AlreadyGone,
            (false, Some(_)) => CleanupOutcome::Occupied,
        };
        if result == CleanupOutcome::Deleted {
            info!(%namespace, room_id = %room_id, "room deleted, all seats left");
        } else {
            debug!(%namespace, room_id = %room_id, ?result, "cleanup skipped");
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Sweep
    // -----------------------------------------------------------------------

    /// Scans every room in `namespace` and deletes the ones
    /// [`sweep_verdict`] condemns.
    ///
    /// Deletions run concurrently and independently: one room failing is
    /// counted in [`SweepReport::failed`] and the rest carry on. Each
    /// deletion re-checks the verdict inside a transaction, so a room
    /// that came back to life since the listing survives.
    ///
    /// # Errors
    ///
    /// Only a failure to list the namespace fails the sweep as a whole.
    pub async fn sweep(&self, namespace: &Namespace) -> Result<SweepReport, PresenceError> {
        let now = self.clock.now_millis();
        let listing = self.store.read(&namespace.root()).await?;
        let rooms = match listing {
            Some(Value::Object(rooms)) => rooms,
            _ => return Ok(SweepReport::default()),
        };

        let mut report = SweepReport {
            scanned: rooms.len(),
            ..Default::default()
        };

        let mut doomed = Vec::new();
        for (key, doc) in &rooms {
            let Ok(room_id) = key.parse::<RoomId>() else {
                report.skipped += 1;
                continue;
            };
            let meta = match JsonCodec.decode::<RoomMeta>(doc) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(%namespace, room_id = %room_id, error = %e, "unreadable room skipped");
                    report.skipped += 1;
                    continue;
                }
            };
            match sweep_verdict(&meta, now, &self.config) {
                SweepVerdict::Keep => {}
                SweepVerdict::Skip => report.skipped += 1,
                SweepVerdict::Delete(reason) => doomed.push((room_id, reason)),
            }
        }

        let results = join_all(
            doomed
                .iter()
                .map(|&(room_id, _)| self.delete_if_still_doomed(namespace, room_id, now)),
        )
        .await;

        for ((room_id, reason), result) in doomed.into_iter().zip(results) {
            match result {
                Ok(true) => {
                    info!(%namespace, room_id = %room_id, %reason, "room swept");
                    report.deleted.push((room_id, reason));
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(%namespace, room_id = %room_id, error = %e, "sweep failed for room");
                    report.failed += 1;
                }
            }
        }

        debug!(
            %namespace,
            scanned = report.scanned,
            deleted = report.deleted.len(),
            failed = report.failed,
            "sweep finished"
        );
        Ok(report)
    }

    async fn delete_if_still_doomed(
        &self,
        namespace: &Namespace,
        room_id: RoomId,
        now: u64,
    ) -> Result<bool, StoreError> {
        let outcome = self
            .store
            .transact(&namespace.room_path(room_id), |cur| {
                let Some(doc) = cur else {
                    return TxDecision::Abort;
                };
                match JsonCodec.decode::<RoomMeta>(doc) {
                    Ok(meta)
                        if matches!(
                            sweep_verdict(&meta, now, &self.config),
                            SweepVerdict::Delete(_)
                        ) =>
                    {
                        TxDecision::Commit(Value::Null)
                    }
                    _ => TxDecision::Abort,
                }
            })
            .await?;
        Ok(outcome.committed)
    }

    /// Sweeps `namespace` every `sweep_interval` until the returned task
    /// is dropped. Failed sweeps are logged and retried next period.
    pub fn spawn_sweeper(&self, namespace: &Namespace) -> PeriodicTask {
        let this = self.clone();
        let namespace = namespace.clone();
        PeriodicTask::spawn(
            "sweeper",
            TickConfig::every(self.config.sweep_interval),
            move |_| {
                let this = this.clone();
                let namespace = namespace.clone();
                async move {
                    if let Err(e) = this.sweep(&namespace).await {
                        warn!(%namespace, error = %e, "sweep failed");
                    }
                }
            },
        )
    }
}
