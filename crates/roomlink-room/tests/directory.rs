//! Integration tests for room id allocation and room lifecycle.

use std::collections::HashSet;

use futures_util::future::join_all;
use roomlink_protocol::{Namespace, RoomId};
use roomlink_room::{DirectoryConfig, RoomDirectory, RoomError};
use roomlink_store::{DocumentStore, MemoryStore};
use serde_json::json;

// =========================================================================
// Helpers
// =========================================================================

const ROOMS: Namespace = Namespace::from_static("rooms");

fn id(raw: u16) -> RoomId {
    RoomId::new(raw).unwrap()
}

// =========================================================================
// allocate
// =========================================================================

#[tokio::test]
async fn test_first_allocation_starts_at_1000() {
    let dir = RoomDirectory::new(MemoryStore::new().connect());
    assert_eq!(dir.allocate(&ROOMS).await.unwrap(), id(1000));
    assert_eq!(dir.allocate(&ROOMS).await.unwrap(), id(1001));
}

#[tokio::test]
async fn test_non_numeric_counter_restarts_at_zero() {
    let store = MemoryStore::new();
    let client = store.connect();
    client
        .set(&ROOMS.counter_path(), json!("garbage"))
        .await
        .unwrap();
    let dir = RoomDirectory::new(client);
    assert_eq!(dir.allocate(&ROOMS).await.unwrap(), id(1000));
}

#[tokio::test]
async fn test_counter_wraps_into_four_digits() {
    let store = MemoryStore::new();
    let client = store.connect();
    client.set(&ROOMS.counter_path(), json!(8999)).await.unwrap();
    let dir = RoomDirectory::new(client);
    // 9000 % 9000 == 0
    assert_eq!(dir.allocate(&ROOMS).await.unwrap(), id(1000));
}

#[tokio::test]
async fn test_allocation_skips_existing_rooms() {
    let store = MemoryStore::new();
    let client = store.connect();
    for raw in [1000, 1001, 1002] {
        client
            .set(&ROOMS.room_path(id(raw)), json!({ "status": "playing" }))
            .await
            .unwrap();
    }
    let dir = RoomDirectory::new(client);
    assert_eq!(dir.allocate(&ROOMS).await.unwrap(), id(1003));
}

#[tokio::test]
async fn test_allocation_exhausted_after_bound() {
    let store = MemoryStore::new();
    let client = store.connect();
    for raw in 1000..1005 {
        client
            .set(&ROOMS.room_path(id(raw)), json!({ "status": "playing" }))
            .await
            .unwrap();
    }
    let dir = RoomDirectory::with_config(client, DirectoryConfig { max_attempts: 5 });
    let err = dir.allocate(&ROOMS).await.unwrap_err();
    assert!(matches!(
        err,
        RoomError::AllocationExhausted { attempts: 5, .. }
    ));
}

#[tokio::test]
async fn test_namespaces_have_independent_counters() {
    let dir = RoomDirectory::new(MemoryStore::new().connect());
    let mines = Namespace::from_static("mineRooms");
    assert_eq!(dir.allocate(&ROOMS).await.unwrap(), id(1000));
    assert_eq!(dir.allocate(&ROOMS).await.unwrap(), id(1001));
    assert_eq!(dir.allocate(&mines).await.unwrap(), id(1000));
}

#[tokio::test]
async fn test_offline_allocation_surfaces_error() {
    let client = MemoryStore::new().connect();
    client.set_online(false);
    let dir = RoomDirectory::new(client);
    let err = dir.allocate(&ROOMS).await.unwrap_err();
    assert!(matches!(err, RoomError::Store(_)));
}

/// No allocation, however interleaved, hands out an id that already had
/// a room document when it was allocated, and concurrent allocations
/// never hand out the same id twice.
#[tokio::test]
async fn test_concurrent_allocations_are_unique_and_free() {
    let store = MemoryStore::new();
    let seed = store.connect();
    let taken: HashSet<RoomId> = [1000, 1003, 1004, 1010].into_iter().map(id).collect();
    for room in &taken {
        seed.set(&ROOMS.room_path(*room), json!({ "status": "playing" }))
            .await
            .unwrap();
    }

    let dirs: Vec<_> = (0..12).map(|_| RoomDirectory::new(store.connect())).collect();
    let rooms = ROOMS;
    let ids: Vec<RoomId> = join_all(dirs.iter().map(|d| d.allocate(&rooms)))
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let unique: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());
    assert!(unique.is_disjoint(&taken));
}

// =========================================================================
// create / exists / delete
// =========================================================================

#[tokio::test]
async fn test_create_writes_initial_document() {
    let dir = RoomDirectory::new(MemoryStore::new().connect());
    let room = dir
        .create(&ROOMS, json!({ "status": "configuring", "createdAt": 1 }))
        .await
        .unwrap();
    assert!(dir.exists(&ROOMS, room).await.unwrap());
    assert_eq!(
        dir.fetch(&ROOMS, room).await.unwrap()["status"],
        json!("configuring")
    );
}

#[tokio::test]
async fn test_delete_then_missing() {
    let dir = RoomDirectory::new(MemoryStore::new().connect());
    let room = dir.create(&ROOMS, json!({ "status": "over" })).await.unwrap();
    dir.delete(&ROOMS, room).await.unwrap();
    assert!(!dir.exists(&ROOMS, room).await.unwrap());
    assert!(matches!(
        dir.fetch(&ROOMS, room).await.unwrap_err(),
        RoomError::NotFound { .. }
    ));
    // Deleting twice is fine.
    dir.delete(&ROOMS, room).await.unwrap();
}

#[tokio::test]
async fn test_deleted_id_is_not_reused_until_counter_wraps() {
    let dir = RoomDirectory::new(MemoryStore::new().connect());
    let first = dir.create(&ROOMS, json!({ "status": "over" })).await.unwrap();
    dir.delete(&ROOMS, first).await.unwrap();
    let second = dir.create(&ROOMS, json!({ "status": "over" })).await.unwrap();
    assert_ne!(first, second);
}
