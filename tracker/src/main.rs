use std::sync::Arc;

use catalog::ProductStore;
use catalog::store::{MemoryProductStore, SqliteProductStore};
use common::logger::init_logger;
use tracker::{
    config::AppConfig,
    invalidation::{ChannelInvalidation, InvalidationEvent},
    notify::LogNotifier,
    scraper::HttpScraper,
    service::PriceTracker,
};

/// Opens the configured store and ensures its schema exists.
async fn init_store(cfg: &AppConfig) -> anyhow::Result<Arc<dyn ProductStore>> {
    if cfg.uses_memory_store() {
        tracing::warn!("using in-memory store; tracked products are lost on exit");
        return Ok(Arc::new(MemoryProductStore::new()));
    }

    let store = SqliteProductStore::new(&cfg.database_url).await?;
    Ok(Arc::new(store))
}

/// Drains invalidation events. Views are not cached in this process, so the
/// events are only logged for whoever tails them.
fn start_invalidation_consumer(mut rx: tokio::sync::mpsc::Receiver<InvalidationEvent>) {
    tokio::spawn(async move {
        while let Some(InvalidationEvent::ProductChanged(product_id)) = rx.recv().await {
            tracing::debug!(%product_id, "product view invalidated");
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logger first: config parsing warns about malformed values.
    init_logger("price-tracker", AppConfig::json_logs_from_env());
    let cfg = AppConfig::from_env();

    tracing::info!("Starting price tracker...");

    let store = init_store(&cfg).await?;
    let scraper = Arc::new(HttpScraper::new(cfg.scraper_timeout)?);

    let (invalidation, invalidation_rx) = ChannelInvalidation::new(256);
    start_invalidation_consumer(invalidation_rx);

    let tracker = PriceTracker::new(store, scraper, Arc::new(LogNotifier), Arc::new(invalidation));

    let refresh = Arc::new(tracker.refresh_job(cfg.discount_threshold));
    tokio::spawn(refresh.run(cfg.refresh_interval, cfg.tracked_urls.clone()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    Ok(())
}
