//! In-process [`DocumentStore`] backend.
//!
//! One [`MemoryStore`] is the "server": a single JSON tree behind a mutex.
//! Each simulated client calls [`MemoryStore::connect`] and talks to the
//! tree through its own [`MemoryClient`], which carries the connection
//! identity that disconnect hooks and offline simulation key on.
//!
//! Transactions are optimistic: the body runs outside the lock against a
//! snapshot, and the result is committed only if the path still holds the
//! same value. Losing writers re-run the body against the newer value.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use roomlink_protocol::Path;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::subscription::Snapshot;
use crate::tree::{merge_at, read_at, remove_at, set_at};
use crate::{
    ConnectionId, DisconnectHook, DocumentStore, StoreError, Subscription, TxDecision, TxOutcome,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// How many times a transaction body may lose a race before the
    /// transaction fails with [`StoreError::Contention`].
    pub max_tx_attempts: u32,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self { max_tx_attempts: 25 }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Subscriber {
    path: Path,
    last: Option<Value>,
    tx: mpsc::UnboundedSender<Snapshot>,
}

struct Hook {
    id: u64,
    path: Path,
    patch: Map<String, Value>,
}

struct State {
    root: Value,
    subscribers: Vec<Subscriber>,
    hooks: HashMap<ConnectionId, Vec<Hook>>,
    offline: HashSet<ConnectionId>,
    faults: Vec<Path>,
    next_connection: u64,
    next_hook: u64,
}

impl State {
    fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
            subscribers: Vec::new(),
            hooks: HashMap::new(),
            offline: HashSet::new(),
            faults: Vec::new(),
            next_connection: 1,
            next_hook: 1,
        }
    }

    /// Fails the operation if the connection is down or a fault covers `path`.
    fn check(&self, conn: ConnectionId, path: &Path) -> Result<(), StoreError> {
        if self.offline.contains(&conn) {
            return Err(StoreError::Offline(conn));
        }
        if self.faults.iter().any(|f| f.contains(path)) {
            return Err(StoreError::Unavailable {
                path: path.clone(),
                reason: "injected fault".into(),
            });
        }
        Ok(())
    }

    /// Pushes the new value to every subscriber whose view `changed` touched.
    fn notify(&mut self, changed: &Path) {
        let root = &self.root;
        self.subscribers.retain_mut(|sub| {
            if !sub.path.overlaps(changed) {
                return !sub.tx.is_closed();
            }
            let now = read_at(root, &sub.path);
            if now == sub.last {
                return !sub.tx.is_closed();
            }
            sub.last = now.clone();
            sub.tx.send(Snapshot { value: now }).is_ok()
        });
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    // A panicking test thread must not wedge every other client.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// The shared in-memory database. Cloning shares the same tree.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    config: MemoryStoreConfig,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }

    pub fn with_config(config: MemoryStoreConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::new())),
            config,
        }
    }

    /// Opens a new client connection.
    pub fn connect(&self) -> MemoryClient {
        let id = {
            let mut state = lock(&self.state);
            let id = ConnectionId::new(state.next_connection);
            state.next_connection += 1;
            id
        };
        debug!(connection = %id, "client connected");
        MemoryClient {
            store: self.clone(),
            id,
        }
    }

    /// Reads a value directly, bypassing any connection. For inspection.
    pub fn snapshot(&self, path: &Path) -> Option<Value> {
        read_at(&lock(&self.state).root, path)
    }

    /// Makes every operation at or below `path` fail with
    /// [`StoreError::Unavailable`] until [`clear_faults`](Self::clear_faults).
    pub fn inject_fault(&self, path: Path) {
        lock(&self.state).faults.push(path);
    }

    pub fn clear_faults(&self) {
        lock(&self.state).faults.clear();
    }

    /// Number of live subscriptions (closed ones are pruned on the next
    /// change they would have observed).
    pub fn subscriber_count(&self) -> usize {
        lock(&self.state)
            .subscribers
            .iter()
            .filter(|s| !s.tx.is_closed())
            .count()
    }
}

// ---------------------------------------------------------------------------
// MemoryClient
// ---------------------------------------------------------------------------

/// One client's connection to a [`MemoryStore`]. Clones share the
/// connection.
#[derive(Clone)]
pub struct MemoryClient {
    store: MemoryStore,
    id: ConnectionId,
}

impl MemoryClient {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Simulates the backend detecting this connection as lost: every
    /// armed disconnect hook is applied once and forgotten. The client
    /// stays usable afterwards, as if it had reconnected.
    pub fn drop_connection(&self) {
        let mut state = lock(&self.store.state);
        let hooks = state.hooks.remove(&self.id).unwrap_or_default();
        let fired = hooks.len();
        for hook in hooks {
            merge_at(&mut state.root, &hook.path, hook.patch);
            state.notify(&hook.path);
        }
        info!(connection = %self.id, fired, "connection dropped, disconnect hooks applied");
    }

    /// Takes the connection offline (every call fails with
    /// [`StoreError::Offline`]) or back online. Hooks do not fire.
    pub fn set_online(&self, online: bool) {
        let mut state = lock(&self.store.state);
        if online {
            state.offline.remove(&self.id);
        } else {
            state.offline.insert(self.id);
        }
    }

    /// Number of disconnect hooks currently armed for this connection.
    pub fn pending_hooks(&self) -> usize {
        lock(&self.store.state)
            .hooks
            .get(&self.id)
            .map_or(0, Vec::len)
    }

    fn write(
        &self,
        path: &Path,
        apply: impl FnOnce(&mut Value),
    ) -> Result<(), StoreError> {
        let mut state = lock(&self.store.state);
        state.check(self.id, path)?;
        apply(&mut state.root);
        state.notify(path);
        Ok(())
    }
}

impl DocumentStore for MemoryClient {
    async fn read(&self, path: &Path) -> Result<Option<Value>, StoreError> {
        let state = lock(&self.store.state);
        state.check(self.id, path)?;
        Ok(read_at(&state.root, path))
    }

    async fn set(&self, path: &Path, value: Value) -> Result<(), StoreError> {
        self.write(path, |root| set_at(root, path, value))
    }

    async fn update(&self, path: &Path, patch: Value) -> Result<(), StoreError> {
        let Value::Object(patch) = patch else {
            return Err(StoreError::InvalidPatch(path.clone()));
        };
        self.write(path, |root| merge_at(root, path, patch))
    }

    async fn remove(&self, path: &Path) -> Result<(), StoreError> {
        self.write(path, |root| remove_at(root, path))
    }

    async fn transact<F>(&self, path: &Path, mut f: F) -> Result<TxOutcome, StoreError>
    where
        F: FnMut(Option<&Value>) -> TxDecision + Send,
    {
        let attempts = self.store.config.max_tx_attempts.max(1);
        for attempt in 1..=attempts {
            let seen = {
                let state = lock(&self.store.state);
                state.check(self.id, path)?;
                read_at(&state.root, path)
            };

            let next = match f(seen.as_ref()) {
                TxDecision::Abort => {
                    return Ok(TxOutcome {
                        committed: false,
                        value: seen,
                    });
                }
                TxDecision::Commit(next) => next,
            };

            // Round trip to the server; other writers may land meanwhile.
            tokio::task::yield_now().await;

            let committed = {
                let mut state = lock(&self.store.state);
                state.check(self.id, path)?;
                if read_at(&state.root, path) == seen {
                    set_at(&mut state.root, path, next);
                    state.notify(path);
                    Some(read_at(&state.root, path))
                } else {
                    None
                }
            };

            match committed {
                Some(value) => {
                    return Ok(TxOutcome {
                        committed: true,
                        value,
                    });
                }
                None => trace!(%path, attempt, "transaction conflict, retrying"),
            }
        }

        debug!(%path, attempts, "transaction gave up under contention");
        Err(StoreError::Contention {
            path: path.clone(),
            attempts,
        })
    }

    async fn subscribe(&self, path: &Path) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = lock(&self.store.state);
        state.check(self.id, path)?;
        let current = read_at(&state.root, path);
        // The receiver is alive, so the first send cannot fail.
        let _ = tx.send(Snapshot {
            value: current.clone(),
        });
        state.subscribers.push(Subscriber {
            path: path.clone(),
            last: current,
            tx,
        });
        Ok(Subscription::new(path.clone(), rx))
    }

    async fn on_disconnect(&self, path: &Path, patch: Value) -> Result<DisconnectHook, StoreError> {
        let Value::Object(patch) = patch else {
            return Err(StoreError::InvalidPatch(path.clone()));
        };
        let hook_id = {
            let mut state = lock(&self.store.state);
            state.check(self.id, path)?;
            let id = state.next_hook;
            state.next_hook += 1;
            state.hooks.entry(self.id).or_default().push(Hook {
                id,
                path: path.clone(),
                patch,
            });
            id
        };
        trace!(connection = %self.id, %path, hook_id, "disconnect hook armed");

        let weak: Weak<Mutex<State>> = Arc::downgrade(&self.store.state);
        let conn = self.id;
        Ok(DisconnectHook::new(path.clone(), move || {
            if let Some(state) = weak.upgrade() {
                let mut state = lock(&state);
                if let Some(hooks) = state.hooks.get_mut(&conn) {
                    hooks.retain(|h| h.id != hook_id);
                }
            }
        }))
    }
}
