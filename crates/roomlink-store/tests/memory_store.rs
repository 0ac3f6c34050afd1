//! Integration tests for the in-memory document store.
//!
//! Exercises the contract every backend has to honour: merge writes,
//! transactions under concurrent writers, ordered subscriptions and
//! one-shot disconnect hooks.

use futures_util::future::join_all;
use roomlink_protocol::Path;
use roomlink_store::{
    DocumentStore, MemoryStore, MemoryStoreConfig, StoreError, TxDecision,
};
use serde_json::{Value, json};

// =========================================================================
// Helpers
// =========================================================================

fn p(s: &str) -> Path {
    Path::parse(s).unwrap()
}

fn increment(current: Option<&Value>) -> TxDecision {
    let n = current.and_then(Value::as_u64).unwrap_or(0);
    TxDecision::Commit(json!(n + 1))
}

// =========================================================================
// Reads and writes
// =========================================================================

#[tokio::test]
async fn test_set_then_read() {
    let client = MemoryStore::new().connect();
    client.set(&p("rooms/1000"), json!({ "status": "configuring" })).await.unwrap();
    assert_eq!(
        client.read(&p("rooms/1000/status")).await.unwrap(),
        Some(json!("configuring"))
    );
}

#[tokio::test]
async fn test_update_is_shallow_merge() {
    let client = MemoryStore::new().connect();
    client
        .set(&p("r"), json!({ "a": 1, "nested": { "x": 1, "y": 2 } }))
        .await
        .unwrap();
    client.update(&p("r"), json!({ "nested": { "x": 9 } })).await.unwrap();
    // The whole `nested` field is replaced, not deep-merged.
    assert_eq!(
        client.read(&p("r")).await.unwrap(),
        Some(json!({ "a": 1, "nested": { "x": 9 } }))
    );
}

#[tokio::test]
async fn test_remove_absent_path_is_ok() {
    let client = MemoryStore::new().connect();
    client.remove(&p("rooms/4242")).await.unwrap();
    assert_eq!(client.read(&p("rooms/4242")).await.unwrap(), None);
}

#[tokio::test]
async fn test_empty_list_reads_back_absent() {
    let client = MemoryStore::new().connect();
    client
        .set(&p("r"), json!({ "status": "playing", "guesses": [] }))
        .await
        .unwrap();
    assert_eq!(client.read(&p("r/guesses")).await.unwrap(), None);
}

// =========================================================================
// Transactions
// =========================================================================

#[tokio::test]
async fn test_transaction_commits_and_returns_value() {
    let client = MemoryStore::new().connect();
    let out = client.transact(&p("counter"), increment).await.unwrap();
    assert!(out.committed);
    assert_eq!(out.value, Some(json!(1)));
}

#[tokio::test]
async fn test_transaction_abort_leaves_value() {
    let client = MemoryStore::new().connect();
    client.set(&p("seat"), json!({ "left": false })).await.unwrap();
    let out = client
        .transact(&p("seat"), |_| TxDecision::Abort)
        .await
        .unwrap();
    assert!(!out.committed);
    assert_eq!(out.value, Some(json!({ "left": false })));
}

#[tokio::test]
async fn test_concurrent_transactions_lose_no_updates() {
    let store = MemoryStore::new();
    let clients: Vec<_> = (0..10).map(|_| store.connect()).collect();
    let path = p("roomCounters/rooms");

    let results = join_all(clients.iter().map(|c| c.transact(&path, increment))).await;
    assert!(results.iter().all(|r| r.as_ref().is_ok_and(|o| o.committed)));
    assert_eq!(store.snapshot(&path), Some(json!(10)));
}

#[tokio::test]
async fn test_transaction_body_sees_latest_value_on_retry() {
    let store = MemoryStore::new();
    let a = store.connect();
    let b = store.connect();
    let path = p("x");

    let mut seen_by_a = Vec::new();
    let (ra, rb) = tokio::join!(
        a.transact(&path, |cur| {
            seen_by_a.push(cur.cloned());
            increment(cur)
        }),
        b.transact(&path, increment),
    );
    assert!(ra.unwrap().committed);
    assert!(rb.unwrap().committed);
    assert_eq!(store.snapshot(&path), Some(json!(2)));
    // Whenever a retried, it saw b's write.
    if seen_by_a.len() > 1 {
        assert_eq!(seen_by_a.last().cloned().flatten(), Some(json!(1)));
    }
}

#[tokio::test]
async fn test_transaction_gives_up_after_bound() {
    let store = MemoryStore::with_config(MemoryStoreConfig { max_tx_attempts: 1 });
    let a = store.connect();
    let b = store.connect();
    let path = p("x");

    let (ra, rb) = tokio::join!(a.transact(&path, increment), b.transact(&path, increment));
    let errors = [ra, rb].into_iter().filter(|r| r.is_err()).count();
    assert_eq!(errors, 1);
    assert_eq!(store.snapshot(&path), Some(json!(1)));
}

#[tokio::test]
async fn test_transaction_commit_null_deletes() {
    let client = MemoryStore::new().connect();
    client.set(&p("rooms/1000"), json!({ "status": "over" })).await.unwrap();
    let out = client
        .transact(&p("rooms/1000"), |_| TxDecision::Commit(Value::Null))
        .await
        .unwrap();
    assert!(out.committed);
    assert_eq!(out.value, None);
    assert_eq!(client.read(&p("rooms")).await.unwrap(), None);
}

// =========================================================================
// Subscriptions
// =========================================================================

#[tokio::test]
async fn test_subscription_delivers_current_then_changes_in_order() {
    let client = MemoryStore::new().connect();
    client.set(&p("r/round"), json!(1)).await.unwrap();

    let mut sub = client.subscribe(&p("r")).await.unwrap();
    client.update(&p("r"), json!({ "round": 2 })).await.unwrap();
    client.update(&p("r"), json!({ "round": 3 })).await.unwrap();
    client.remove(&p("r")).await.unwrap();

    let rounds: Vec<Option<Value>> = [
        sub.next().await.unwrap(),
        sub.next().await.unwrap(),
        sub.next().await.unwrap(),
        sub.next().await.unwrap(),
    ]
    .into_iter()
    .map(|s| s.value.and_then(|v| v.get("round").cloned()))
    .collect();
    assert_eq!(rounds, vec![Some(json!(1)), Some(json!(2)), Some(json!(3)), None]);
}

#[tokio::test]
async fn test_subscription_ignores_unrelated_and_identical_writes() {
    let client = MemoryStore::new().connect();
    let mut sub = client.subscribe(&p("rooms/1000")).await.unwrap();
    assert!(!sub.next().await.unwrap().exists());

    client.set(&p("rooms/1001/status"), json!("waiting")).await.unwrap();
    client.set(&p("rooms/1000/status"), json!("waiting")).await.unwrap();
    client.set(&p("rooms/1000/status"), json!("waiting")).await.unwrap();

    assert!(sub.next().await.unwrap().exists());
    assert!(sub.try_next().is_none());
}

#[tokio::test]
async fn test_dropping_subscription_unsubscribes() {
    let store = MemoryStore::new();
    let client = store.connect();
    let sub = client.subscribe(&p("r")).await.unwrap();
    assert_eq!(store.subscriber_count(), 1);
    drop(sub);
    client.set(&p("r/x"), json!(1)).await.unwrap();
    assert_eq!(store.subscriber_count(), 0);
}

// =========================================================================
// Disconnect hooks
// =========================================================================

#[tokio::test]
async fn test_disconnect_hook_fires_exactly_once() {
    let store = MemoryStore::new();
    let owner = store.connect();
    let other = store.connect();
    let seat = p("rooms/1000/players/A");

    owner.set(&seat, json!({ "left": false, "secret": "1234" })).await.unwrap();
    let _hook = owner
        .on_disconnect(&seat, json!({ "left": true, "secret": "" }))
        .await
        .unwrap();

    other.drop_connection();
    assert_eq!(store.snapshot(&seat.child("left")), Some(json!(false)));

    owner.drop_connection();
    assert_eq!(store.snapshot(&seat.child("left")), Some(json!(true)));

    // Re-occupy; a second drop must not replay the old hook.
    other.update(&seat, json!({ "left": false })).await.unwrap();
    owner.drop_connection();
    assert_eq!(store.snapshot(&seat.child("left")), Some(json!(false)));
}

#[tokio::test]
async fn test_on_disconnect_requires_object_patch() {
    let client = MemoryStore::new().connect();
    let err = client.on_disconnect(&p("x"), json!(true)).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidPatch(_)));
}
