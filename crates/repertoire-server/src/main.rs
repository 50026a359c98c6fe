use std::time::Duration;

use anyhow::Context;
use repertoire_core::{JsonFileStore, StudyLibrary};
use repertoire_server::{app, config, state::AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env();

    tracing::info!("Opening study library in {}", config.data_dir.display());
    let store = JsonFileStore::open(&config.data_dir).context("Failed to open data directory")?;
    let library = StudyLibrary::open(Box::new(store) as repertoire_server::state::Store)
        .context("Failed to load study library")?;

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, library);

    // Sweep abandoned training sessions
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let evicted = sweeper.prune_idle_sessions().await;
            if evicted > 0 {
                tracing::info!(evicted, "Evicted idle training sessions");
            }
        }
    });

    let app = app(state);

    tracing::info!("Starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
