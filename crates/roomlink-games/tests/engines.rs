//! Engines driven through `EngineRunner` against the in-memory store.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future::join_all;
use rand::SeedableRng;
use rand::rngs::StdRng;
use roomlink_games::flags::{
    BoardEdit, GuessResult, HouseIntent, HouseRoom, HouseSeat, PkIntent, PkSeat,
};
use roomlink_games::market::{MarketSettings, MarketSetup};
use roomlink_games::{
    DuelEngine, DuelIntent, DuelOutcome, DuelSeat, DuelStatus, EngineRunner, FlagOutcome,
    FlagStatus, GameError, HouseEngine, MarketEngine, MarketIntent, MarketOutcome, MarketRoom,
    MarketSeat, MarketStatus, PkEngine, Rejection, TurnEngine,
};
use roomlink_protocol::{JsonCodec, ManualClock, RoomId};
use roomlink_store::{DocumentStore, MemoryClient, MemoryStore};
use serde_json::json;

// =========================================================================
// Helpers
// =========================================================================

const START: u64 = 1_700_000_000_000;

fn runner<E: TurnEngine>(engine: E, store: &MemoryStore, seed: u64) -> EngineRunner<E, MemoryClient> {
    EngineRunner::with_parts(
        engine,
        store.connect(),
        Arc::new(ManualClock::new(START)),
        StdRng::seed_from_u64(seed),
    )
}

/// Writes a freshly opened room under a fixed id.
async fn create<E: TurnEngine>(
    runner: &EngineRunner<E, MemoryClient>,
    raw_id: u16,
    host: E::Seat,
    setup: E::Setup,
) -> RoomId {
    let room_id = RoomId::new(raw_id).unwrap();
    let (_, doc) = runner.open(host, setup).unwrap();
    runner
        .store()
        .set(&E::NAMESPACE.room_path(room_id), doc)
        .await
        .unwrap();
    room_id
}

/// Marks `seat` occupied the way a claim does.
async fn occupy<E: TurnEngine>(runner: &EngineRunner<E, MemoryClient>, room_id: RoomId, seat: &str) {
    runner
        .store()
        .update(&E::NAMESPACE.seat_path(room_id, seat), json!({ "left": false }))
        .await
        .unwrap();
}

fn quiet_market() -> MarketEngine {
    MarketEngine::new(MarketSettings {
        event_chance: 0.0,
        ..MarketSettings::default()
    })
}

/// A two-trader market with trading open.
async fn trading_market(store: &MemoryStore) -> (EngineRunner<MarketEngine, MemoryClient>, RoomId) {
    let market = runner(quiet_market(), store, 9);
    let setup = MarketSetup {
        max_players: 2,
        ..MarketSetup::default()
    };
    let room_id = create(&market, 4321, MarketSeat::HOST, setup).await;
    let guest = market
        .run(room_id, |room, ctx| market.engine().admit(room, ctx.now))
        .await
        .unwrap();
    market.submit(room_id, MarketSeat::HOST, MarketIntent::Start).await.unwrap();
    market.submit(room_id, MarketSeat::HOST, MarketIntent::TakeLoan(100_000)).await.unwrap();
    market.submit(room_id, guest, MarketIntent::TakeLoan(100_000)).await.unwrap();
    (market, room_id)
}

// =========================================================================
// Duel
// =========================================================================

#[tokio::test]
async fn test_duel_match_host_guesses_first_and_wins() {
    let store = MemoryStore::new();
    let duel = runner(DuelEngine::default(), &store, 1);
    let room = create(&duel, 1234, DuelSeat::A, ()).await;
    occupy(&duel, room, "B").await;

    duel.submit(room, DuelSeat::A, DuelIntent::SetSecret("1234".into())).await.unwrap();
    duel.submit(room, DuelSeat::B, DuelIntent::SetSecret("5678".into())).await.unwrap();
    duel.submit(room, DuelSeat::A, DuelIntent::SetStarter(DuelSeat::A)).await.unwrap();
    let started = duel.submit(room, DuelSeat::A, DuelIntent::Start).await.unwrap();
    assert_eq!(started, DuelOutcome::Started { turn: DuelSeat::A });

    let guessed = duel
        .submit(room, DuelSeat::A, DuelIntent::Guess("5678".into()))
        .await
        .unwrap();
    assert_eq!(guessed, DuelOutcome::Guessed { hits: 4, won: true });

    let doc = store.snapshot(&DuelEngine::NAMESPACE.room_path(room)).unwrap();
    assert_eq!(doc["status"], "over");
    assert_eq!(doc["winner"], "A");
    assert_eq!(doc["lastActive"], START);

    let state = duel.load(room).await.unwrap().unwrap();
    assert_eq!(state.status, DuelStatus::Over);
    assert_eq!(state.guesses.len(), 1);
}

#[tokio::test]
async fn test_rejected_intent_writes_nothing() {
    let store = MemoryStore::new();
    let duel = runner(DuelEngine::default(), &store, 1);
    let room = create(&duel, 1234, DuelSeat::A, ()).await;
    let path = DuelEngine::NAMESPACE.room_path(room);
    let before = store.snapshot(&path);

    let err = duel
        .submit(room, DuelSeat::B, DuelIntent::Start)
        .await
        .unwrap_err();
    assert!(matches!(err.rejection(), Some(Rejection::NotPermitted { .. })));

    let err = duel
        .submit(room, DuelSeat::A, DuelIntent::Guess("12".into()))
        .await
        .unwrap_err();
    assert!(matches!(err.rejection(), Some(Rejection::WrongStatus { .. })));

    assert_eq!(store.snapshot(&path), before);
}

#[tokio::test]
async fn test_submit_to_missing_room() {
    let store = MemoryStore::new();
    let duel = runner(DuelEngine::default(), &store, 1);
    let room = RoomId::new(5555).unwrap();

    let err = duel.submit(room, DuelSeat::A, DuelIntent::Start).await.unwrap_err();
    assert!(matches!(err, GameError::RoomNotFound { .. }));
    assert!(duel.load(room).await.unwrap().is_none());
    assert!(store.snapshot(&DuelEngine::NAMESPACE.room_path(room)).is_none());
}

/// Fields written by other clients (newer versions, chat widgets) ride
/// along through every transaction.
#[tokio::test]
async fn test_duel_move_keeps_fields_it_does_not_model() {
    let store = MemoryStore::new();
    let duel = runner(DuelEngine::default(), &store, 1);
    let room = create(&duel, 1234, DuelSeat::A, ()).await;
    let path = DuelEngine::NAMESPACE.room_path(room);
    let client = store.connect();
    client.update(&path, json!({ "chatMeta": { "pinned": 3 } })).await.unwrap();
    client
        .update(&DuelEngine::NAMESPACE.seat_path(room, "A"), json!({ "avatar": "cat" }))
        .await
        .unwrap();

    duel.submit(room, DuelSeat::A, DuelIntent::SetSecret("1234".into())).await.unwrap();

    let doc = store.snapshot(&path).unwrap();
    assert_eq!(doc["players"]["A"]["secret"], "1234");
    assert_eq!(doc["chatMeta"], json!({ "pinned": 3 }));
    assert_eq!(doc["players"]["A"]["avatar"], "cat");
}

// =========================================================================
// Flags
// =========================================================================

#[tokio::test]
async fn test_house_round_ends_on_first_mine() {
    let store = MemoryStore::new();
    let house = runner(HouseEngine::default(), &store, 1);
    let room = create(&house, 2000, HouseSeat::Host, ()).await;
    occupy(&house, room, "player").await;

    house.submit(room, HouseSeat::Host, HouseIntent::SetEntryFee(5)).await.unwrap();
    for x in 0..3 {
        house
            .submit(room, HouseSeat::Host, HouseIntent::Edit(BoardEdit::Place { x, y: 2 }))
            .await
            .unwrap();
    }
    house
        .submit(room, HouseSeat::Host, HouseIntent::Edit(BoardEdit::ToggleMine { x: 1, y: 2 }))
        .await
        .unwrap();
    house.submit(room, HouseSeat::Host, HouseIntent::Start).await.unwrap();
    let after_start: HouseRoom = house.load(room).await.unwrap().unwrap();

    let outcome = house
        .submit(room, HouseSeat::Player, HouseIntent::Guess { x: 1, y: 2 })
        .await
        .unwrap();
    assert_eq!(outcome, FlagOutcome::Guessed(GuessResult::Mine));

    let state = house.load(room).await.unwrap().unwrap();
    assert_eq!(state.status, FlagStatus::Over);
    assert!(state.result.contains("Mine"));
    assert_eq!(state.scores, after_start.scores);
    assert_eq!((state.scores.host, state.scores.player), (5, -5));

    let again = house
        .submit(room, HouseSeat::Player, HouseIntent::Guess { x: 0, y: 2 })
        .await
        .unwrap_err();
    assert!(matches!(again.rejection(), Some(Rejection::WrongStatus { .. })));
}

#[tokio::test]
async fn test_flag_engines_refuse_the_other_mode() {
    let store = MemoryStore::new();
    let pk = runner(PkEngine::default(), &store, 1);
    let room = create(&pk, 3000, PkSeat::A, ()).await;

    let house = runner(HouseEngine::default(), &store, 1);
    let err = house.load(room).await.unwrap_err();
    assert!(matches!(err.rejection(), Some(Rejection::WrongMode { .. })));
    assert!(pk.load(room).await.unwrap().is_some());
}

#[tokio::test]
async fn test_pk_edit_keeps_seat_and_field_extras() {
    let store = MemoryStore::new();
    let pk = runner(PkEngine::default(), &store, 1);
    let room = create(&pk, 3001, PkSeat::A, ()).await;
    let path = PkEngine::NAMESPACE.room_path(room);
    let client = store.connect();
    client
        .update(&PkEngine::NAMESPACE.seat_path(room, "A"), json!({ "avatar": "fox" }))
        .await
        .unwrap();
    client
        .update(&path.child("fields").child("B"), json!({ "theme": "night" }))
        .await
        .unwrap();

    pk.submit(room, PkSeat::A, PkIntent::Edit(BoardEdit::Place { x: 0, y: 0 }))
        .await
        .unwrap();

    let doc = store.snapshot(&path).unwrap();
    assert_eq!(doc["fields"]["A"]["flags"].as_array().map(Vec::len), Some(1));
    assert_eq!(doc["players"]["A"]["avatar"], "fox");
    assert_eq!(doc["players"]["A"]["left"], false);
    assert_eq!(doc["fields"]["B"]["theme"], "night");
}

// =========================================================================
// Market
// =========================================================================

#[tokio::test]
async fn test_concurrent_joins_take_distinct_seats() {
    let store = MemoryStore::new();
    let host = runner(quiet_market(), &store, 2);
    let room = create(&host, 4000, MarketSeat::HOST, MarketSetup::default()).await;

    let guests: Vec<_> = (0..4).map(|i| runner(quiet_market(), &store, 10 + i)).collect();
    let results = join_all(
        guests
            .iter()
            .map(|g| g.run(room, |doc, ctx| g.engine().admit(doc, ctx.now))),
    )
    .await;

    let seats: BTreeSet<String> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        seats,
        ["P2", "P3", "P4"].into_iter().map(String::from).collect()
    );
    let refused = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(refused, 1);

    let state = host.load(room).await.unwrap().unwrap();
    assert_eq!(state.active_count(), 4);
}

#[tokio::test]
async fn test_round_resolution_keeps_trader_and_room_extras() {
    let store = MemoryStore::new();
    let (market, room) = trading_market(&store).await;
    let path = MarketEngine::NAMESPACE.room_path(room);
    let client = store.connect();
    client.update(&path, json!({ "theme": "dark" })).await.unwrap();
    client
        .update(&MarketEngine::NAMESPACE.seat_path(room, "P2"), json!({ "badge": "gold" }))
        .await
        .unwrap();

    market.submit(room, MarketSeat::HOST, MarketIntent::Ready).await.unwrap();
    let closing = market
        .submit(room, "P2".parse().unwrap(), MarketIntent::Ready)
        .await
        .unwrap();
    assert!(matches!(closing, MarketOutcome::Ready { resolved: Some(_) }));

    let doc = store.snapshot(&path).unwrap();
    assert_eq!(doc["round"], 2);
    assert_eq!(doc["theme"], "dark");
    assert_eq!(doc["players"]["P2"]["badge"], "gold");
}

#[tokio::test]
async fn test_round_resolution_is_observed_whole() {
    let store = MemoryStore::new();
    let (market, room) = trading_market(&store).await;
    let mut sub = store
        .connect()
        .subscribe(&MarketEngine::NAMESPACE.room_path(room))
        .await
        .unwrap();
    let decode = |snap: roomlink_store::Snapshot| -> MarketRoom {
        snap.decode(&JsonCodec).unwrap().unwrap()
    };
    let opening = decode(sub.next().await.unwrap());
    assert_eq!(opening.status, MarketStatus::Playing);

    market
        .submit(room, MarketSeat::HOST, MarketIntent::Buy { stock: 0, quantity: 10 })
        .await
        .unwrap();
    market.submit(room, MarketSeat::HOST, MarketIntent::Ready).await.unwrap();
    let closing = market
        .submit(room, "P2".parse().unwrap(), MarketIntent::Ready)
        .await
        .unwrap();
    let MarketOutcome::Ready { resolved: Some(summary) } = closing else {
        panic!("the second ready closes the round");
    };
    assert_eq!(summary.round, 1);

    let bought = decode(sub.next().await.unwrap());
    assert_eq!(bought.round, 1);
    assert!(!bought.turn_buys.is_empty());
    let one_ready = decode(sub.next().await.unwrap());
    assert_eq!(one_ready.round, 1);

    let resolved = decode(sub.next().await.unwrap());
    assert_eq!(resolved.round, 2);
    assert!(resolved.turn_buys.is_empty());
    assert!(resolved.players.values().all(|t| !t.ready));
    assert!(resolved.stocks.iter().all(|s| s.history.len() == 2));
    assert!(!resolved.sector_performance.is_empty());
    assert!(sub.try_next().is_none());
}

#[tokio::test]
async fn test_simultaneous_ready_resolves_once() {
    let store = MemoryStore::new();
    let (market, room) = trading_market(&store).await;
    let other = runner(quiet_market(), &store, 77);

    let (a, b) = tokio::join!(
        market.submit(room, MarketSeat::HOST, MarketIntent::Ready),
        other.submit(room, "P2".parse().unwrap(), MarketIntent::Ready),
    );
    let resolutions = [a.unwrap(), b.unwrap()]
        .into_iter()
        .filter(|o| matches!(o, MarketOutcome::Ready { resolved: Some(_) }))
        .count();
    assert_eq!(resolutions, 1);

    let state = market.load(room).await.unwrap().unwrap();
    assert_eq!(state.round, 2);
}

#[tokio::test]
async fn test_market_game_runs_to_the_end() {
    let store = MemoryStore::new();
    let (market, room) = trading_market(&store).await;
    let guest: MarketSeat = "P2".parse().unwrap();
    let max_rounds = market.load(room).await.unwrap().unwrap().max_rounds;

    for _ in 0..max_rounds {
        market.submit(room, MarketSeat::HOST, MarketIntent::Ready).await.unwrap();
        market.submit(room, guest, MarketIntent::Ready).await.unwrap();
    }
    let state = market.load(room).await.unwrap().unwrap();
    assert_eq!(state.status, MarketStatus::Over);
    assert_eq!(state.round, max_rounds + 1);

    let err = market
        .submit(room, MarketSeat::HOST, MarketIntent::Ready)
        .await
        .unwrap_err();
    assert!(matches!(err.rejection(), Some(Rejection::WrongStatus { .. })));

    market.submit(room, MarketSeat::HOST, MarketIntent::Restart).await.unwrap();
    let state = market.load(room).await.unwrap().unwrap();
    assert_eq!(state.status, MarketStatus::Borrowing);
    assert_eq!(state.round, 1);
}
