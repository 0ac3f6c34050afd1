//! Document store abstraction for Roomlink.
//!
//! Provides the [`DocumentStore`] trait: a hierarchical JSON key-path
//! store with point reads, merge writes, per-path atomic transactions,
//! change subscriptions, and disconnect-triggered writes. This is the
//! only serialization point in the system; there is no game server
//! process, just clients running the same protocol against the store.
//!
//! [`MemoryStore`] is an in-process backend with the same semantics
//! (compare-and-set transactions with retry, per-path ordered
//! subscriptions, one-shot disconnect hooks). Each simulated client
//! connects with [`MemoryStore::connect`] and gets its own
//! [`MemoryClient`].

mod error;
mod memory;
mod subscription;
mod tree;

pub use error::StoreError;
pub use memory::{MemoryClient, MemoryStore, MemoryStoreConfig};
pub use subscription::{DisconnectHook, Snapshot, Subscription};

use std::fmt;
use std::future::Future;

use roomlink_protocol::Path;
use serde_json::Value;

/// Opaque identifier for one client connection to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What a transaction body wants to do with the value it was shown.
#[derive(Debug, Clone, PartialEq)]
pub enum TxDecision {
    /// Replace the value with this one (`Value::Null` deletes it).
    Commit(Value),
    /// Leave the value untouched and report `committed: false`.
    Abort,
}

/// Result of [`DocumentStore::transact`].
#[derive(Debug, Clone, PartialEq)]
pub struct TxOutcome {
    /// `true` if the body's value was written.
    pub committed: bool,
    /// The value at the path after the transaction (the written value on
    /// commit, the value the body last saw on abort).
    pub value: Option<Value>,
}

/// A hierarchical JSON document store.
///
/// Every method is a network round trip in a real deployment, so all of
/// them are async. The returned futures are `Send` so stores can be used
/// from spawned tasks (heartbeats, sweepers).
///
/// # Semantics
///
/// - `update` shallow-merges an object patch: each top-level key is
///   written independently (last writer wins per field), `null` deletes.
/// - `transact` runs `f` against the latest value and commits only if
///   nothing changed the subtree in between; otherwise it calls `f` again
///   with the newer value. `f` must therefore be a pure function of its
///   input.
/// - `subscribe` yields the current value first, then every change, in
///   order, for that path. No ordering holds across different paths.
/// - `on_disconnect` arms a patch the backend applies exactly once when
///   this client's connection drops.
pub trait DocumentStore: Send + Sync + 'static {
    /// Reads the value at `path`, `None` if absent.
    fn read(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// Replaces the value at `path` unconditionally.
    fn set(
        &self,
        path: &Path,
        value: Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Shallow-merges an object `patch` into the value at `path`.
    fn update(
        &self,
        path: &Path,
        patch: Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes the value at `path`. Deleting an absent path succeeds.
    fn remove(&self, path: &Path) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Atomically read-modify-writes the value at `path`.
    fn transact<F>(
        &self,
        path: &Path,
        f: F,
    ) -> impl Future<Output = Result<TxOutcome, StoreError>> + Send
    where
        F: FnMut(Option<&Value>) -> TxDecision + Send;

    /// Streams the value at `path`: once now, then on every change.
    fn subscribe(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<Subscription, StoreError>> + Send;

    /// Arms `patch` to be merged at `path` when this connection drops.
    fn on_disconnect(
        &self,
        path: &Path,
        patch: Value,
    ) -> impl Future<Output = Result<DisconnectHook, StoreError>> + Send;
}
