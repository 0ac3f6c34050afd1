//! `EngineRunner`: drives a [`TurnEngine`] against the shared store.

use std::sync::{Arc, Mutex, PoisonError};

use rand::SeedableRng;
use rand::rngs::StdRng;
use roomlink_protocol::{Clock, Codec, JsonCodec, Namespace, RoomId, SystemClock};
use roomlink_store::{DocumentStore, TxDecision};
use serde_json::Value;
use tracing::debug;

use crate::{EngineCtx, GameError, RoomDocument, TurnEngine};

/// Runs engine intents as store transactions on the room document.
///
/// Every submission reads the whole room, applies the intent to a typed
/// copy, and commits the result in one compare-and-set. Subscribers
/// therefore only ever see a room before or after an intent, never in
/// between. On contention the store re-runs the engine on the fresh
/// document.
///
/// Cheap to clone: the engine, clock and random source are shared.
pub struct EngineRunner<E, S> {
    engine: Arc<E>,
    store: S,
    namespace: Namespace,
    clock: Arc<dyn Clock>,
    rng: Arc<Mutex<StdRng>>,
}

impl<E, S: Clone> Clone for EngineRunner<E, S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            store: self.store.clone(),
            namespace: self.namespace.clone(),
            clock: Arc::clone(&self.clock),
            rng: Arc::clone(&self.rng),
        }
    }
}

impl<E: TurnEngine, S: DocumentStore> EngineRunner<E, S> {
    /// A runner on the system clock with an OS-seeded random source.
    pub fn new(engine: E, store: S) -> Self {
        Self::with_parts(engine, store, Arc::new(SystemClock), StdRng::from_os_rng())
    }

    /// A runner with an explicit clock and random source.
    pub fn with_parts(engine: E, store: S, clock: Arc<dyn Clock>, rng: StdRng) -> Self {
        Self {
            engine: Arc::new(engine),
            store,
            namespace: E::NAMESPACE,
            clock,
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Decodes a raw room document, upgrading legacy shapes first.
    pub fn decode_room(raw: &Value) -> Result<E::Room, GameError> {
        E::recognize(raw)?;
        let mut raw = raw.clone();
        E::upgrade(&mut raw);
        Ok(JsonCodec.decode(&raw)?)
    }

    /// Builds and encodes the initial document for a new room.
    pub fn open(&self, host: E::Seat, setup: E::Setup) -> Result<(E::Room, Value), GameError> {
        let now = self.clock.now_millis();
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let room = self.engine.open(host, setup, &mut EngineCtx::new(now, &mut rng))?;
        let doc = JsonCodec.encode(&room)?;
        Ok((room, doc))
    }

    /// Reads the room, or `None` if it does not exist.
    pub async fn load(&self, room_id: RoomId) -> Result<Option<E::Room>, GameError> {
        let raw = self.store.read(&self.namespace.room_path(room_id)).await?;
        raw.map(|raw| Self::decode_room(&raw)).transpose()
    }

    /// Validates `intent`, then applies it atomically.
    ///
    /// # Errors
    ///
    /// - [`GameError::Rejected`] if the engine refused; nothing was written.
    /// - [`GameError::RoomNotFound`] if the room is gone.
    /// - [`GameError::Store`] on connectivity loss or exhausted retries.
    pub async fn submit(
        &self,
        room_id: RoomId,
        seat: E::Seat,
        intent: E::Intent,
    ) -> Result<E::Outcome, GameError> {
        if let Err(rejection) = self.engine.precheck(&intent) {
            debug!(namespace = %self.namespace, room_id = %room_id, %seat, %rejection, "intent failed validation");
            return Err(rejection.into());
        }
        let result = self
            .run(room_id, |room, ctx| self.engine.apply(room, seat, &intent, ctx))
            .await;
        match &result {
            Ok(outcome) => {
                debug!(namespace = %self.namespace, room_id = %room_id, %seat, ?intent, ?outcome, "intent applied");
            }
            Err(e) => {
                debug!(namespace = %self.namespace, room_id = %room_id, %seat, ?intent, error = %e, "intent not applied");
            }
        }
        result
    }

    /// Runs `f` on the typed room inside one transaction and commits the
    /// result, stamping `lastActive`. If `f` rejects, the transaction
    /// aborts and the rejection is returned.
    ///
    /// `f` may run several times under contention; only the run that
    /// commits counts.
    pub async fn run<T, F>(&self, room_id: RoomId, mut f: F) -> Result<T, GameError>
    where
        T: Send,
        F: FnMut(&mut E::Room, &mut EngineCtx<'_>) -> Result<T, crate::Rejection> + Send,
    {
        let now = self.clock.now_millis();
        let path = self.namespace.room_path(room_id);
        let mut verdict: Option<Result<T, GameError>> = None;

        let outcome = self
            .store
            .transact(&path, |cur| match self.attempt(room_id, cur, now, &mut f) {
                Ok((doc, value)) => {
                    verdict = Some(Ok(value));
                    TxDecision::Commit(doc)
                }
                Err(e) => {
                    verdict = Some(Err(e));
                    TxDecision::Abort
                }
            })
            .await?;

        match verdict {
            Some(Ok(value)) if outcome.committed => Ok(value),
            Some(Err(e)) => Err(e),
            _ => Err(GameError::NotCommitted { room_id }),
        }
    }

    fn attempt<T, F>(
        &self,
        room_id: RoomId,
        cur: Option<&Value>,
        now: u64,
        f: &mut F,
    ) -> Result<(Value, T), GameError>
    where
        F: FnMut(&mut E::Room, &mut EngineCtx<'_>) -> Result<T, crate::Rejection>,
    {
        let Some(raw) = cur else {
            return Err(GameError::RoomNotFound {
                namespace: self.namespace.clone(),
                room_id,
            });
        };
        let mut room = Self::decode_room(raw)?;
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let value = f(&mut room, &mut EngineCtx::new(now, &mut rng))?;
        room.touch(now);
        Ok((JsonCodec.encode(&room)?, value))
    }
}
