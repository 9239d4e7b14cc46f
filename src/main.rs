//! Catalog bootstrap.
//!
//! Opens the configured engine, makes sure the default tag type and an admin
//! account exist, and reports what the catalog holds.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use media_catalog::{Config, DataHandler, DataResult, EngineKind, MemoryStorage, Repository, Storage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting media catalog");
    tracing::info!("Engine: {:?}", config.engine);

    match config.engine {
        EngineKind::Memory => {
            tracing::warn!("In-memory engine selected: nothing will be persisted");
            bootstrap(DataHandler::from_config(MemoryStorage::new(), &config)).await?;
        }
        EngineKind::Sqlite => {
            tracing::info!("Database path: {:?}", config.db_path);
            let repo = Repository::open(&config.db_path).await?;
            bootstrap(DataHandler::from_config(repo, &config)).await?;
        }
    }

    Ok(())
}

async fn bootstrap<S: Storage>(handler: DataHandler<S>) -> DataResult<()> {
    handler.ensure_default_type().await?;
    handler.ensure_admin().await?;

    let tag_types = handler.search_tag_types("", 0, 1).await?;
    let tags = handler.search_tags("", 0, 1).await?;
    let users = handler.search_users("", 0, 1).await?;
    tracing::info!(
        "Catalog ready: {} tag types, {} tags, {} users",
        tag_types.total,
        tags.total,
        users.total
    );
    Ok(())
}
