mod api;
mod config;
mod error;
mod export;
mod ledger;
mod marketplace;
mod profile;
mod seed;
mod session;
mod store;
mod sync;
mod types;

use std::sync::Arc;
use std::time::Instant;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::ledger::PriceLedger;
use crate::marketplace::{ListingReconciler, ListingRegistry};
use crate::profile::ProfileStore;
use crate::session::SessionTracker;
use crate::store::LocalStore;
use crate::sync::SyncState;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let options = SqliteConnectOptions::new()
        .filename(&cfg.db_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Local store + first-run seeding ---
    let store = LocalStore::open(pool).await?;
    let counts = store.counts();
    info!(
        prices = counts.prices,
        listings = counts.listings,
        profiles = counts.profiles,
        audit_entries = counts.price_audit,
        "Local store ready",
    );
    seed::seed_if_empty(&store).await?;

    // --- Services (constructor-injected, no ambient singletons) ---
    let ledger = Arc::new(PriceLedger::new(Arc::clone(&store)));
    let registry = Arc::new(ListingRegistry::new(Arc::clone(&store)));
    let profiles = Arc::new(ProfileStore::new(Arc::clone(&store)));
    let sync = Arc::new(SyncState::new());
    let session = Arc::new(SessionTracker::new(Arc::clone(&store), cfg.logout_policy));

    // --- Background fan-out reconciler ---
    let reconciler = ListingReconciler::new(Arc::clone(&store));
    tokio::spawn(async move { reconciler.run().await });

    // --- HTTP API ---
    let api_state = ApiState {
        store,
        ledger,
        registry,
        profiles,
        sync,
        session,
        started: Instant::now(),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
