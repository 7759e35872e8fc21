use std::sync::Arc;

use ethics_review::config::{Config, StoreBackend};
use ethics_review::db::{self, MemoryStore, PgStore, SharedStore};
use ethics_review::routes;
use ethics_review::state::AppState;
use ethics_review::storage::{self, LocalBlobStore};
use ethics_review::workflow::directory;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ethics_review=info,tower_http=info".into()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    storage::ensure_dirs(&config.upload_folder)?;

    let store: SharedStore = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = db::create_pool(&config.database_url).await?;
            db::run_migrations(pool.as_ref()).await?;
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    if config.reviewer_seed_file.exists() {
        if let Err(e) = directory::seed_from_file(store.as_ref(), &config.reviewer_seed_file).await {
            tracing::warn!("Reviewer seeding skipped: {}", e);
        }
    }

    let blobs = Arc::new(LocalBlobStore::new(config.upload_folder.clone()));
    let state = Arc::new(AppState::new(config.clone(), store, blobs)?);
    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Ethics review listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
