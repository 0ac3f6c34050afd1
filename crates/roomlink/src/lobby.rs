//! `Lobby` builder: opens and joins tables, and runs the namespace sweepers.
//!
//! A lobby belongs to one client connection. Every table it opens shares
//! that connection, so dropping the connection fires the disconnect hooks
//! of every seat the client holds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rand::SeedableRng;
use rand::rngs::StdRng;
use roomlink_games::{EngineRunner, MarketEngine, TurnEngine};
use roomlink_presence::{LivenessConfig, PresenceManager, SweepReport};
use roomlink_protocol::{Clock, Namespace, RoomId, SystemClock};
use roomlink_room::{DirectoryConfig, RoomDirectory};
use roomlink_store::DocumentStore;
use roomlink_tick::PeriodicTask;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{RoomlinkError, Table};

/// Builder for a [`Lobby`].
///
/// # Example
///
/// ```rust,ignore
/// use roomlink::prelude::*;
///
/// let store = MemoryStore::new();
/// let lobby = LobbyBuilder::new()
///     .liveness(LivenessConfig::default())
///     .build(store.connect());
/// let table = lobby.create_table(DuelEngine::default(), DuelSeat::A, ()).await?;
/// ```
pub struct LobbyBuilder {
    clock: Arc<dyn Clock>,
    liveness: LivenessConfig,
    directory: DirectoryConfig,
    seed: Option<u64>,
}

impl LobbyBuilder {
    /// Creates a new builder with the system clock and default settings.
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            liveness: LivenessConfig::default(),
            directory: DirectoryConfig::default(),
            seed: None,
        }
    }

    /// Sets the clock used for timestamps, heartbeats and round timers.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets heartbeat and sweep timing.
    pub fn liveness(mut self, config: LivenessConfig) -> Self {
        self.liveness = config;
        self
    }

    /// Sets the room-id allocation settings.
    pub fn directory(mut self, config: DirectoryConfig) -> Self {
        self.directory = config;
        self
    }

    /// Seeds the game engines' random draws. Without a seed each table
    /// draws from the OS.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds a lobby on top of one store connection.
    pub fn build<S: DocumentStore + Clone>(self, store: S) -> Lobby<S> {
        Lobby {
            directory: RoomDirectory::with_config(store.clone(), self.directory),
            presence: PresenceManager::with_clock(store.clone(), self.clock.clone(), self.liveness),
            store,
            clock: self.clock,
            seed: self.seed,
            runners: AtomicU64::new(0),
            sweepers: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for LobbyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry point for a client: create or join tables, sweep namespaces.
pub struct Lobby<S> {
    store: S,
    clock: Arc<dyn Clock>,
    directory: RoomDirectory<S>,
    presence: PresenceManager<S>,
    seed: Option<u64>,
    runners: AtomicU64,
    sweepers: Mutex<HashMap<Namespace, PeriodicTask>>,
}

impl<S: DocumentStore + Clone> Lobby<S> {
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn directory(&self) -> &RoomDirectory<S> {
        &self.directory
    }

    pub fn presence(&self) -> &PresenceManager<S> {
        &self.presence
    }

    /// A runner for `engine` on this lobby's connection and clock.
    pub fn runner<E: TurnEngine>(&self, engine: E) -> EngineRunner<E, S> {
        let rng = match self.seed {
            Some(seed) => {
                let n = self.runners.fetch_add(1, Ordering::Relaxed);
                StdRng::seed_from_u64(seed.wrapping_add(n))
            }
            None => StdRng::from_os_rng(),
        };
        EngineRunner::with_parts(engine, self.store.clone(), self.clock.clone(), rng)
    }

    // -----------------------------------------------------------------------
    // Tables
    // -----------------------------------------------------------------------

    /// Opens a new room with `host` seated and returns the host's table.
    ///
    /// # Errors
    ///
    /// - [`RoomlinkError::Game`] if the engine refused `setup`.
    /// - [`RoomlinkError::Room`] if no free room id could be found.
    pub async fn create_table<E: TurnEngine>(
        &self,
        engine: E,
        host: E::Seat,
        setup: E::Setup,
    ) -> Result<Table<E, S>, RoomlinkError> {
        let runner = self.runner(engine);
        let (_, doc) = runner.open(host, setup)?;
        let room_id = self.directory.create(runner.namespace(), doc).await?;
        info!(namespace = %runner.namespace(), room_id = %room_id, seat = %host, "table opened");
        self.sit(runner, room_id, host).await
    }

    /// Takes `seat` in an existing room.
    ///
    /// # Errors
    ///
    /// - [`RoomlinkError::RoomNotFound`] if the room does not exist. No
    ///   seat is written, so a stale code cannot conjure a ghost room.
    /// - [`RoomlinkError::SeatTaken`] if someone live holds the seat.
    pub async fn join_table<E: TurnEngine>(
        &self,
        engine: E,
        room_id: RoomId,
        seat: E::Seat,
    ) -> Result<Table<E, S>, RoomlinkError> {
        let runner = self.runner(engine);
        self.ensure_exists(runner.namespace(), room_id).await?;

        let payload = runner.engine().seat_payload(seat, self.clock.now_millis());
        let claimed = self
            .directory
            .claim_seat(runner.namespace(), room_id, &seat.to_string(), payload)
            .await?;
        if !claimed {
            return Err(RoomlinkError::SeatTaken {
                room_id,
                seat: seat.to_string(),
            });
        }
        self.sit(runner, room_id, seat).await
    }

    /// Joins a market room at the first free seat.
    ///
    /// The seat is picked inside the room transaction, so concurrent
    /// newcomers always end up on distinct seats.
    pub async fn join_market(
        &self,
        engine: MarketEngine,
        room_id: RoomId,
    ) -> Result<Table<MarketEngine, S>, RoomlinkError> {
        let runner = self.runner(engine);
        self.ensure_exists(runner.namespace(), room_id).await?;

        let seat = runner
            .run(room_id, |room, ctx| runner.engine().admit(room, ctx.now))
            .await?;
        info!(namespace = %runner.namespace(), room_id = %room_id, %seat, "trader admitted");
        self.sit(runner, room_id, seat).await
    }

    async fn ensure_exists(
        &self,
        namespace: &Namespace,
        room_id: RoomId,
    ) -> Result<(), RoomlinkError> {
        if self.directory.exists(namespace, room_id).await? {
            Ok(())
        } else {
            Err(RoomlinkError::RoomNotFound {
                namespace: namespace.clone(),
                room_id,
            })
        }
    }

    /// Attaches presence for a seat this client now holds and starts the
    /// room heartbeat.
    async fn sit<E: TurnEngine>(
        &self,
        runner: EngineRunner<E, S>,
        room_id: RoomId,
        seat: E::Seat,
    ) -> Result<Table<E, S>, RoomlinkError> {
        let offline = departure_patch(runner.engine().offline_patch(seat));
        let guard = self
            .presence
            .attach(
                runner.namespace(),
                room_id,
                &seat.to_string(),
                json!({ "left": false }),
                offline,
            )
            .await?;
        let heartbeat = self.presence.spawn_heartbeat(runner.namespace(), room_id);
        Ok(Table::new(
            runner,
            self.directory.clone(),
            self.presence.clone(),
            room_id,
            seat,
            guard,
            heartbeat,
        ))
    }

    // -----------------------------------------------------------------------
    // Sweeping
    // -----------------------------------------------------------------------

    /// Starts sweeping `namespace` every `sweep_interval`. Returns `false`
    /// if this lobby already sweeps it.
    pub fn start_sweeper(&self, namespace: &Namespace) -> bool {
        let mut sweepers = self.sweepers.lock().unwrap_or_else(PoisonError::into_inner);
        if sweepers.contains_key(namespace) {
            return false;
        }
        sweepers.insert(namespace.clone(), self.presence.spawn_sweeper(namespace));
        info!(%namespace, "sweeper started");
        true
    }

    /// Stops sweeping `namespace`. Returns `false` if it was not swept.
    pub fn stop_sweeper(&self, namespace: &Namespace) -> bool {
        let stopped = self
            .sweepers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(namespace)
            .is_some();
        if stopped {
            debug!(%namespace, "sweeper stopped");
        }
        stopped
    }

    pub fn is_sweeping(&self, namespace: &Namespace) -> bool {
        self.sweepers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(namespace)
    }

    /// Runs one sweep of `namespace` right now.
    pub async fn sweep(&self, namespace: &Namespace) -> Result<SweepReport, RoomlinkError> {
        Ok(self.presence.sweep(namespace).await?)
    }
}

/// The engine's offline patch with the seat marked as left.
fn departure_patch(patch: Value) -> Value {
    match patch {
        Value::Object(mut map) => {
            map.insert("left".to_string(), Value::Bool(true));
            Value::Object(map)
        }
        other => other,
    }
}
