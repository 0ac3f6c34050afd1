//! Room id allocation and room document lifecycle.

use roomlink_protocol::{Namespace, RoomId};
use roomlink_store::{DocumentStore, StoreError, TxDecision};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{DirectoryConfig, RoomError};

/// Creates, looks up and deletes rooms in any namespace, and arbitrates
/// seats inside them (see the seat methods).
///
/// The directory is a thin, stateless layer over a store connection;
/// clone the store and build one per client.
#[derive(Debug, Clone)]
pub struct RoomDirectory<S> {
    pub(crate) store: S,
    config: DirectoryConfig,
}

impl<S: DocumentStore> RoomDirectory<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, DirectoryConfig::default())
    }

    pub fn with_config(store: S, config: DirectoryConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Draws a room id that no existing room in `namespace` uses.
    ///
    /// Each attempt increments the shared counter at
    /// `roomCounters/<key>` in a transaction (a missing or non-numeric
    /// counter restarts at 0), maps the value into `1000..=9999`, and
    /// keeps it if nothing lives at that id. Concurrent callers always
    /// get distinct counter values, so they only collide after the
    /// counter wraps the id space.
    ///
    /// # Errors
    ///
    /// [`RoomError::AllocationExhausted`] after `max_attempts` draws.
    /// Connectivity failures abort immediately.
    pub async fn allocate(&self, namespace: &Namespace) -> Result<RoomId, RoomError> {
        let counter = namespace.counter_path();

        for attempt in 1..=self.config.max_attempts {
            let outcome = match self
                .store
                .transact(&counter, |cur| {
                    let next = cur.and_then(Value::as_u64).map_or(0, |n| n + 1);
                    TxDecision::Commit(json!(next))
                })
                .await
            {
                Ok(outcome) => outcome,
                Err(StoreError::Contention { .. }) => {
                    debug!(%namespace, attempt, "room counter contended, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if !outcome.committed {
                continue;
            }

            let seq = outcome.value.as_ref().and_then(Value::as_u64).unwrap_or(0);
            let room_id = RoomId::from_sequence(seq);

            if self.store.read(&namespace.room_path(room_id)).await?.is_none() {
                debug!(%namespace, room_id = %room_id, attempt, "room id allocated");
                return Ok(room_id);
            }
        }

        warn!(%namespace, attempts = self.config.max_attempts, "room id space exhausted");
        Err(RoomError::AllocationExhausted {
            namespace: namespace.clone(),
            attempts: self.config.max_attempts,
        })
    }

    /// Allocates an id and writes `initial` there unconditionally.
    ///
    /// Not idempotent: if the write fails the id is simply never used.
    pub async fn create(&self, namespace: &Namespace, initial: Value) -> Result<RoomId, RoomError> {
        let room_id = self.allocate(namespace).await?;
        self.store.set(&namespace.room_path(room_id), initial).await?;
        info!(%namespace, room_id = %room_id, "room created");
        Ok(room_id)
    }

    pub async fn exists(&self, namespace: &Namespace, room_id: RoomId) -> Result<bool, RoomError> {
        Ok(self
            .store
            .read(&namespace.room_path(room_id))
            .await?
            .is_some())
    }

    /// Reads the whole room document.
    pub async fn fetch(&self, namespace: &Namespace, room_id: RoomId) -> Result<Value, RoomError> {
        self.store
            .read(&namespace.room_path(room_id))
            .await?
            .ok_or_else(|| RoomError::NotFound {
                namespace: namespace.clone(),
                room_id,
            })
    }

    /// Deletes the room document. Deleting a missing room succeeds.
    pub async fn delete(&self, namespace: &Namespace, room_id: RoomId) -> Result<(), RoomError> {
        self.store.remove(&namespace.room_path(room_id)).await?;
        info!(%namespace, room_id = %room_id, "room deleted");
        Ok(())
    }
}
