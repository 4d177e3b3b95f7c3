use anyhow::{Context, Result};
use matching_service::config::StoreBackend;
use matching_service::{
    commands, Config, MatchingService, MemoryPostingStore, PostingStore, RedisPostingStore,
};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; stdout carries responses
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env().context("Failed to load config")?;

    info!(
        "Starting {} with {:?} store, namespace {}",
        config.service.service_name, config.service.store, config.matching.key_namespace
    );

    match config.service.store {
        StoreBackend::Memory => serve(Arc::new(MemoryPostingStore::new()), &config).await,
        StoreBackend::Redis => {
            let store = RedisPostingStore::connect(&config.redis.url)
                .await
                .with_context(|| format!("Failed to connect to Redis at {}", config.redis.url))?;
            store.ping().await.context("Redis ping failed")?;
            info!("Connected to Redis");

            serve(Arc::new(store), &config).await
        }
    }
}

async fn serve<S: PostingStore>(store: Arc<S>, config: &Config) -> Result<()> {
    let service = MatchingService::new(store, config.matching.clone());

    let answered = commands::run_lines(
        &service,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
    .context("Command stream failed")?;

    info!(answered = answered, "Shutting down");
    Ok(())
}
