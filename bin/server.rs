// Spend Forecast - Web Server
// REST API with Axum

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use spend_forecast::api::{serve, AppState};
use spend_forecast::config::ServerConfig;
use spend_forecast::{logging, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing();
    let config = ServerConfig::parse();

    let store = SqliteStore::open(&config.store.db)?;
    info!(
        db = %config.store.db.display(),
        tz_offset = %config.store.tz_offset,
        "database opened"
    );

    let state = AppState::new(store, Arc::new(config.store.clock()));
    serve(state, &config.addr).await
}
