use roomlink_protocol::{Namespace, RoomId};
use roomlink_store::DisconnectHook;
use tracing::debug;

/// Scoped ownership of a seat's disconnect hook.
///
/// While the guard lives, losing the connection marks the seat offline.
/// Cancelling or dropping the guard disarms the hook, so a session that
/// ended on purpose can never flip the seat of whoever sits there next.
#[must_use = "dropping a PresenceGuard disarms the disconnect hook immediately"]
pub struct PresenceGuard {
    namespace: Namespace,
    room_id: RoomId,
    seat: String,
    hook: Option<DisconnectHook>,
}

impl PresenceGuard {
    pub(crate) fn new(
        namespace: Namespace,
        room_id: RoomId,
        seat: String,
        hook: DisconnectHook,
    ) -> Self {
        Self {
            namespace,
            room_id,
            seat,
            hook: Some(hook),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn seat(&self) -> &str {
        &self.seat
    }

    /// Disarms the hook now. Same as dropping the guard.
    pub fn cancel(mut self) {
        self.disarm();
    }

    fn disarm(&mut self) {
        if let Some(hook) = self.hook.take() {
            hook.cancel();
            debug!(
                namespace = %self.namespace,
                room_id = %self.room_id,
                seat = %self.seat,
                "disconnect hook cancelled"
            );
        }
    }
}

impl Drop for PresenceGuard {
    fn drop(&mut self) {
        self.disarm();
    }
}

impl std::fmt::Debug for PresenceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceGuard")
            .field("namespace", &self.namespace)
            .field("room_id", &self.room_id)
            .field("seat", &self.seat)
            .field("armed", &self.hook.is_some())
            .finish()
    }
}
