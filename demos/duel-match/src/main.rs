use roomlink::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

const HOST_SECRET: &str = "1234";
const GUEST_SECRET: &str = "5678";

/// Prints every version of the room the guest sees until the match ends.
async fn watch(mut updates: Subscription) {
    while let Some(snapshot) = updates.next().await {
        let Some(doc) = snapshot.value else {
            println!("room closed");
            return;
        };
        println!(
            "status={} turn={} guesses={}",
            doc["status"],
            doc["turn"],
            doc["guesses"].as_array().map_or(0, Vec::len)
        );
        if doc["status"] == "over" {
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // One shared store, two client connections.
    let store = MemoryStore::new();
    let host = LobbyBuilder::new().build(store.connect());
    let guest = LobbyBuilder::new().build(store.connect());
    host.start_sweeper(&DuelEngine::NAMESPACE);

    let a = host
        .create_table(DuelEngine::default(), DuelSeat::A, ())
        .await?;
    println!("room code {}", a.room_id());

    let b = guest
        .join_table(DuelEngine::default(), a.room_id(), DuelSeat::B)
        .await?;
    let watcher = tokio::spawn(watch(b.subscribe().await?));

    a.submit(DuelIntent::SetSecret(HOST_SECRET.into())).await?;
    b.submit(DuelIntent::SetSecret(GUEST_SECRET.into())).await?;
    a.submit(DuelIntent::SetStarter(DuelSeat::A)).await?;
    a.submit(DuelIntent::Start).await?;

    // Out of turn: refused, nothing written.
    if let Err(e) = b.submit(DuelIntent::Guess(HOST_SECRET.into())).await {
        println!("guest refused: {e}");
    }

    let outcome = a.submit(DuelIntent::Guess(GUEST_SECRET.into())).await?;
    println!("host guessed {GUEST_SECRET}: {outcome:?}");
    watcher.await?;

    let room = b.room().await?;
    if let Some(room) = room {
        println!("winner: {:?}", room.winner);
    }

    println!("host leaves: {:?}", a.leave().await?);
    println!("guest leaves: {:?}", b.leave().await?);
    host.stop_sweeper(&DuelEngine::NAMESPACE);
    Ok(())
}
