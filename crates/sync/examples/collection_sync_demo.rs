/// Collection Sync Demo
///
/// Walks one client through a session:
/// 1. Bind a session signal to the sync engine
/// 2. Sign in and wait for the collections to load
/// 3. Add favorites, must-watch entries and a review
/// 4. Sign out and watch everything clear
///
/// Uses the REST store when MOVIE_SHELF_STORE_URL is set, otherwise an
/// in-memory store.
///
/// Run with: cargo run --example collection_sync_demo
use movie_shelf_core::{init_tracing, load_dotenv, ConfigLoader, StoreConfig, TracingConfig};
use movie_shelf_sync::{
    CollectionSync, CollectionsApi, InMemoryCollectionStore, MovieId, SessionBinder, UserId,
    WatchSessionSignal,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();
    init_tracing(TracingConfig::from_env())?;

    println!("Collection Sync Demo");
    println!("====================\n");

    let sync = if std::env::var("MOVIE_SHELF_STORE_URL").is_ok() {
        let config = StoreConfig::from_env()?;
        config.validate()?;
        println!("Using REST store at {}", config.url);
        CollectionSync::from_config(&config)?
    } else {
        println!("Using in-memory store");
        CollectionSync::new(Arc::new(InMemoryCollectionStore::new()))
    };

    let signal = WatchSessionSignal::new();
    let mut binder = SessionBinder::spawn(sync.clone(), &signal);
    let api = CollectionsApi::new(sync.clone());

    // Step 1: sign in
    let user_id = std::env::var("DEMO_USER_ID").unwrap_or_else(|_| "demo-user".to_string());
    println!("\n1. Signing in as {}...", user_id);
    signal.sign_in(UserId::parse(user_id)?);

    if let Some(report) = binder.next_report().await {
        println!("   - Loaded: {:?}", report.loaded);
        for failure in &report.failures {
            println!("   - Failed: {}", failure);
        }
    }

    // Step 2: mutate
    println!("\n2. Updating collections...");
    let fight_club = MovieId::Number(550);
    let inception = MovieId::Number(27205);

    println!("   - add favorite 550: {:?}", api.add_to_favorites(&fight_club).await?);
    println!("   - add favorite 550 again: {:?}", api.add_to_favorites(&fight_club).await?);
    println!("   - add must-watch 27205: {:?}", api.add_to_must_watch(&inception).await?);
    println!(
        "   - review 550: {:?}",
        api.upsert_review(&fight_club, "Still holds up").await?
    );

    let snapshot = api.snapshot();
    println!("   - Favorites: {:?}", snapshot.favorites.as_slice());
    println!("   - Must watch: {:?}", snapshot.must_watch.as_slice());
    println!("   - Reviews: {:?}", snapshot.reviews);

    // Step 3: sign out
    println!("\n3. Signing out...");
    let mut rx = api.subscribe();
    signal.sign_out();
    rx.wait_for(|snapshot| snapshot.user_id.is_none()).await?;
    println!("   - Collections empty: {}", api.snapshot().is_empty());

    binder.shutdown().await;
    println!("\nDone");
    Ok(())
}
