//! Seat claiming.
//!
//! A seat is free when its subtree is absent or says `left: true` (or
//! anything other than an explicit `left: false`). Claims go through a
//! transaction on the seat subtree; the first-seat write at room creation
//! and the release on leave are plain writes, since only the owner ever
//! touches an occupied seat.

use roomlink_protocol::{Namespace, RoomId};
use roomlink_store::{DocumentStore, TxDecision};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{RoomDirectory, RoomError};

fn occupied(seat: Option<&Value>) -> bool {
    seat.and_then(|s| s.get("left"))
        .and_then(Value::as_bool)
        .is_some_and(|left| !left)
}

fn with_left(seat: &str, payload: Value, left: bool) -> Result<Map<String, Value>, RoomError> {
    let Value::Object(mut map) = payload else {
        return Err(RoomError::InvalidSeatPayload {
            seat: seat.to_string(),
        });
    };
    map.insert("left".into(), Value::Bool(left));
    Ok(map)
}

impl<S: DocumentStore> RoomDirectory<S> {
    /// Takes `seat` unless someone live holds it.
    ///
    /// Replaces the seat's subtree with `payload` (forced to `left:
    /// false`). Returns `false`, changing nothing, if the seat currently
    /// says `left: false`.
    pub async fn claim_seat(
        &self,
        namespace: &Namespace,
        room_id: RoomId,
        seat: &str,
        payload: Value,
    ) -> Result<bool, RoomError> {
        let payload = Value::Object(with_left(seat, payload, false)?);
        let path = namespace.seat_path(room_id, seat);

        let outcome = self
            .store
            .transact(&path, |cur| {
                if occupied(cur) {
                    TxDecision::Abort
                } else {
                    TxDecision::Commit(payload.clone())
                }
            })
            .await?;

        if outcome.committed {
            info!(%namespace, room_id = %room_id, seat, "seat claimed");
        } else {
            debug!(%namespace, room_id = %room_id, seat, "seat already occupied");
        }
        Ok(outcome.committed)
    }

    /// Writes the creator's seat without a transaction. Only valid right
    /// after [`create`](Self::create), before anyone else knows the id.
    pub async fn claim_first_seat(
        &self,
        namespace: &Namespace,
        room_id: RoomId,
        seat: &str,
        payload: Value,
    ) -> Result<(), RoomError> {
        let payload = Value::Object(with_left(seat, payload, false)?);
        self.store
            .set(&namespace.seat_path(room_id, seat), payload)
            .await?;
        info!(%namespace, room_id = %room_id, seat, "first seat taken");
        Ok(())
    }

    /// Marks `seat` as left, merging `offline_patch` (typically blanking
    /// per-seat secrets) into it.
    pub async fn release_seat(
        &self,
        namespace: &Namespace,
        room_id: RoomId,
        seat: &str,
        offline_patch: Value,
    ) -> Result<(), RoomError> {
        let patch = Value::Object(with_left(seat, offline_patch, true)?);
        self.store
            .update(&namespace.seat_path(room_id, seat), patch)
            .await?;
        info!(%namespace, room_id = %room_id, seat, "seat released");
        Ok(())
    }
}
