//! `Table`: one seat held by this client in one room.

use std::time::Duration;

use roomlink_games::{EngineRunner, MarketEngine, MarketIntent, MarketRoom, MarketStatus, TurnEngine};
use roomlink_presence::{CleanupOutcome, PresenceGuard, PresenceManager};
use roomlink_protocol::{Clock, JsonCodec, Namespace, RoomId, RoomMeta};
use roomlink_room::RoomDirectory;
use roomlink_store::{DocumentStore, Snapshot, Subscription};
use roomlink_tick::{Countdown, PeriodicTask, RoundClock};
use tracing::{debug, info, warn};

use crate::RoomlinkError;

/// A seat at a game table.
///
/// While the table lives, the seat's disconnect hook stays armed and the
/// room is heartbeated. [`leave`](Self::leave) gives the seat up cleanly;
/// dropping the table only stops the background tasks and disarms the
/// hook, leaving the seat marked as held.
pub struct Table<E: TurnEngine, S> {
    runner: EngineRunner<E, S>,
    directory: RoomDirectory<S>,
    presence: PresenceManager<S>,
    room_id: RoomId,
    seat: E::Seat,
    guard: Option<PresenceGuard>,
    heartbeat: Option<PeriodicTask>,
    round_timer: Option<Countdown>,
}

impl<E: TurnEngine, S: DocumentStore + Clone> Table<E, S> {
    pub(crate) fn new(
        runner: EngineRunner<E, S>,
        directory: RoomDirectory<S>,
        presence: PresenceManager<S>,
        room_id: RoomId,
        seat: E::Seat,
        guard: PresenceGuard,
        heartbeat: PeriodicTask,
    ) -> Self {
        Self {
            runner,
            directory,
            presence,
            room_id,
            seat,
            guard: Some(guard),
            heartbeat: Some(heartbeat),
            round_timer: None,
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn seat(&self) -> E::Seat {
        self.seat
    }

    pub fn namespace(&self) -> &Namespace {
        self.runner.namespace()
    }

    pub fn runner(&self) -> &EngineRunner<E, S> {
        &self.runner
    }

    /// The room as it is now, `None` once it has been deleted.
    pub async fn room(&self) -> Result<Option<E::Room>, RoomlinkError> {
        Ok(self.runner.load(self.room_id).await?)
    }

    /// Streams the whole room document: once now, then on every change.
    pub async fn subscribe(&self) -> Result<Subscription, RoomlinkError> {
        let path = self.namespace().room_path(self.room_id);
        Ok(self.runner.store().subscribe(&path).await?)
    }

    /// Plays `intent` from this table's seat.
    pub async fn submit(&self, intent: E::Intent) -> Result<E::Outcome, RoomlinkError> {
        Ok(self.runner.submit(self.room_id, self.seat, intent).await?)
    }

    /// Gives the seat up: marks it left (blanking the seat's secrets),
    /// disarms the disconnect hook, and deletes the room if nobody is
    /// left in it. If others remain, whatever they were waiting on this
    /// seat for is settled (see [`settle`](Self::settle)).
    pub async fn leave(mut self) -> Result<CleanupOutcome, RoomlinkError> {
        self.round_timer = None;
        self.heartbeat = None;
        if let Some(guard) = self.guard.take() {
            guard.cancel();
        }

        let seat = self.seat.to_string();
        let offline = self.runner.engine().offline_patch(self.seat);
        self.directory
            .release_seat(self.namespace(), self.room_id, &seat, offline)
            .await?;

        let outcome = self
            .presence
            .cleanup_if_all_left(self.namespace(), self.room_id, E::SEATS)
            .await?;
        if outcome == CleanupOutcome::Occupied {
            if let Err(e) = self.settle().await {
                warn!(namespace = %self.namespace(), room_id = %self.room_id, error = %e, "settle after leave failed");
            }
        }
        info!(
            namespace = %self.namespace(),
            room_id = %self.room_id,
            seat,
            ?outcome,
            "left table"
        );
        Ok(outcome)
    }

    /// Lets the engine finish work held up by a vacated seat, e.g. close
    /// a round the departed trader never readied. Subscribers call this
    /// when they see a seat go offline; [`leave`](Self::leave) calls it
    /// itself.
    pub async fn settle(&self) -> Result<Option<E::Outcome>, RoomlinkError> {
        let engine = self.runner.engine();
        let settled = self
            .runner
            .run(self.room_id, |room, ctx| engine.settle(room, ctx))
            .await?;
        if let Some(outcome) = &settled {
            info!(namespace = %self.namespace(), room_id = %self.room_id, ?outcome, "room settled");
        }
        Ok(settled)
    }

    /// Deletes the room if `snapshot` shows seated players who have all
    /// left. Returns `true` if this call deleted it.
    ///
    /// Meant for subscribers: whoever sees the room abandoned first
    /// removes it. The delete re-checks the seats inside a transaction.
    pub async fn reap_if_ghost(&self, snapshot: &Snapshot) -> Result<bool, RoomlinkError> {
        let Some(meta) = snapshot.decode::<RoomMeta>(&JsonCodec)? else {
            return Ok(false);
        };
        if meta.players.is_empty() || !meta.all_known_left() {
            return Ok(false);
        }
        let outcome = self
            .presence
            .cleanup_if_all_left(self.namespace(), self.room_id, E::SEATS)
            .await?;
        debug!(namespace = %self.namespace(), room_id = %self.room_id, ?outcome, "abandoned room observed");
        Ok(outcome == CleanupOutcome::Deleted)
    }
}

impl<S: DocumentStore + Clone> Table<MarketEngine, S> {
    /// The clock of the round `room` is in.
    pub fn round_clock(&self, room: &MarketRoom) -> RoundClock {
        let window = Duration::from_secs(self.runner.engine().settings().round_window_secs);
        RoundClock::new(room.round_start_time, window)
    }

    /// Whole seconds left in the current round.
    pub fn seconds_left(&self, room: &MarketRoom) -> u64 {
        self.round_clock(room)
            .seconds_left(self.runner.clock().now_millis())
    }

    /// Arms the round timer: when the round window runs out this seat is
    /// marked ready. Any previously armed timer is cancelled.
    ///
    /// Nothing is armed (and `false` returned) unless the room is playing
    /// with more than one seat and this trader is solvent and not ready
    /// yet. If the round has moved on by the time the timer fires, it does
    /// nothing.
    pub fn arm_round_timer(&mut self, room: &MarketRoom) -> bool {
        self.round_timer = None;
        let Some(trader) = room.trader(self.seat) else {
            return false;
        };
        if room.status != MarketStatus::Playing
            || room.max_players <= 1
            || trader.ready
            || trader.is_bankrupt
        {
            return false;
        }

        let delay = self
            .round_clock(room)
            .remaining(self.runner.clock().now_millis());
        let runner = self.runner.clone();
        let (room_id, seat, round) = (self.room_id, self.seat, room.round);
        self.round_timer = Some(Countdown::spawn(delay, move || async move {
            let result = runner
                .run(room_id, |room, ctx| {
                    if room.status != MarketStatus::Playing || room.round != round {
                        return Ok(None);
                    }
                    runner
                        .engine()
                        .apply(room, seat, &MarketIntent::Ready, ctx)
                        .map(Some)
                })
                .await;
            match result {
                Ok(Some(outcome)) => {
                    info!(room_id = %room_id, %seat, round, ?outcome, "round timer ran out");
                }
                Ok(None) => debug!(room_id = %room_id, %seat, round, "round already over"),
                Err(e) => debug!(room_id = %room_id, %seat, error = %e, "auto-ready failed"),
            }
        }));
        true
    }

    pub fn round_timer_armed(&self) -> bool {
        self.round_timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}
