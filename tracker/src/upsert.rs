use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

use catalog::{Product, ProductCandidate, ProductStore, ScrapedProduct};
use common::logger::warn_if_slow;
use pricing::{Observation, merge};

use crate::error::{TrackerError, store_err};
use crate::invalidation::InvalidationSink;
use crate::locks::KeyedLocks;
use crate::scraper::Scraper;

/// Result of one ingestion attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The product as stored after this ingestion.
    Stored(Product),
    /// The scraper had nothing for this source. Nothing was written;
    /// try again next cycle.
    Skipped,
}

impl UpsertOutcome {
    pub fn product(&self) -> Option<&Product> {
        match self {
            UpsertOutcome::Stored(p) => Some(p),
            UpsertOutcome::Skipped => None,
        }
    }
}

/// A completed ingestion with the record it replaced, if any.
#[derive(Clone, Debug)]
pub struct Ingestion {
    pub previous: Option<Product>,
    pub product: Product,
}

/// Scrape → merge → persist for one listing.
///
/// Products are keyed on url. The first ingestion for a url creates the
/// product; every later one appends exactly one observation and recomputes the
/// stats over the whole history. First-time products go through the same
/// merge as existing ones, with an empty starting history.
pub struct ProductUpsert {
    scraper: Arc<dyn Scraper>,
    store: Arc<dyn ProductStore>,
    locks: Arc<KeyedLocks>,
    invalidation: Arc<dyn InvalidationSink>,
}

impl ProductUpsert {
    pub fn new(
        scraper: Arc<dyn Scraper>,
        store: Arc<dyn ProductStore>,
        locks: Arc<KeyedLocks>,
        invalidation: Arc<dyn InvalidationSink>,
    ) -> Self {
        Self {
            scraper,
            store,
            locks,
            invalidation,
        }
    }

    pub async fn upsert(&self, source_ref: &str) -> Result<UpsertOutcome, TrackerError> {
        Ok(match self.upsert_tracked(source_ref).await? {
            Some(ingestion) => UpsertOutcome::Stored(ingestion.product),
            None => UpsertOutcome::Skipped,
        })
    }

    /// Like [`Self::upsert`], but also returns the record that was replaced.
    /// `None` means the scrape was skipped.
    #[instrument(skip(self), fields(source_ref = %source_ref))]
    pub async fn upsert_tracked(&self, source_ref: &str) -> Result<Option<Ingestion>, TrackerError> {
        if source_ref.trim().is_empty() {
            debug!("empty source reference; nothing to scrape");
            return Ok(None);
        }

        let Some(snapshot) = self.scraper.scrape(source_ref).await else {
            info!("scraper returned nothing; skipping");
            return Ok(None);
        };

        self.ingest(snapshot).await.map(Some)
    }

    /// Merge an already scraped snapshot into the store.
    #[instrument(skip(self, snapshot), fields(url = %snapshot.url, price = %snapshot.current_price))]
    pub async fn ingest(&self, snapshot: ScrapedProduct) -> Result<Ingestion, TrackerError> {
        let guard = self.locks.lock(&snapshot.url).await;

        let previous = warn_if_slow("db_find_by_url", Duration::from_millis(100), async {
            self.store.find_by_url(&snapshot.url).await
        })
        .await
        .map_err(store_err("find_by_url", &snapshot.url))?;

        let (history, users) = match &previous {
            Some(p) => (p.price_history.as_slice(), p.users.clone()),
            None => (&[][..], Vec::new()),
        };

        let merged = merge(history, Observation::new(snapshot.current_price))?;
        let candidate = ProductCandidate::from_scrape(snapshot, merged, users);

        let product = warn_if_slow("db_upsert_by_url", Duration::from_millis(200), async {
            self.store.upsert_by_url(&candidate).await
        })
        .await
        .map_err(store_err("upsert_by_url", &candidate.url))?;

        drop(guard);

        info!(
            product_id = %product.id,
            observations = product.price_history.len(),
            lowest = %product.lowest_price,
            highest = %product.highest_price,
            average = %product.average_price,
            created = previous.is_none(),
            "product ingested"
        );

        self.invalidation.invalidate(product.id);

        Ok(Ingestion { previous, product })
    }
}
