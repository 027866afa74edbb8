use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::instrument;

use catalog::{ProductId, ProductStore};

use crate::error::TrackerError;
use crate::interest::{InterestRegistry, Registration};
use crate::invalidation::InvalidationSink;
use crate::locks::KeyedLocks;
use crate::notify::{DispatchReport, NotificationDispatcher, Notifier};
use crate::queries::ProductQueries;
use crate::refresh::RefreshJob;
use crate::scraper::Scraper;
use crate::upsert::{ProductUpsert, UpsertOutcome};

/// Registration result together with what happened to its notification.
#[derive(Clone, Debug)]
pub struct InterestReport {
    pub registration: Registration,
    pub dispatch: DispatchReport,
}

/// Wires the pipeline together around one store handle.
///
/// Ingestion and registration share a single lock table so both kinds of
/// read-modify-write on the same product are serialised against each other.
pub struct PriceTracker {
    store: Arc<dyn ProductStore>,
    upsert: Arc<ProductUpsert>,
    registry: InterestRegistry,
    dispatcher: Arc<NotificationDispatcher>,
    queries: ProductQueries,
}

impl PriceTracker {
    pub fn new(
        store: Arc<dyn ProductStore>,
        scraper: Arc<dyn Scraper>,
        notifier: Arc<dyn Notifier>,
        invalidation: Arc<dyn InvalidationSink>,
    ) -> Self {
        let locks = Arc::new(KeyedLocks::new());

        Self {
            upsert: Arc::new(ProductUpsert::new(
                scraper,
                Arc::clone(&store),
                Arc::clone(&locks),
                invalidation,
            )),
            registry: InterestRegistry::new(Arc::clone(&store), locks),
            dispatcher: Arc::new(NotificationDispatcher::new(notifier)),
            queries: ProductQueries::new(Arc::clone(&store)),
            store,
        }
    }

    /// Scrape `product_url` and merge the observation into its history.
    pub async fn scrape_and_store(&self, product_url: &str) -> Result<UpsertOutcome, TrackerError> {
        self.upsert.upsert(product_url).await
    }

    /// Register `user_email` against `product_id` and send the welcome
    /// message if, and only if, this call added the user.
    ///
    /// A failed notification is reported in the result, never as an error:
    /// the registration is already stored at that point.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn track_interest(
        &self,
        product_id: ProductId,
        user_email: &str,
    ) -> Result<InterestReport, TrackerError> {
        let registration = self
            .registry
            .register_interest(product_id, user_email)
            .await?;

        let dispatch = self
            .dispatcher
            .dispatch_if_new(&registration.product, user_email, registration.outcome)
            .await;

        Ok(InterestReport {
            registration,
            dispatch,
        })
    }

    pub fn queries(&self) -> &ProductQueries {
        &self.queries
    }

    pub fn refresh_job(&self, discount_threshold: Decimal) -> RefreshJob {
        RefreshJob::new(
            Arc::clone(&self.upsert),
            Arc::clone(&self.store),
            Arc::clone(&self.dispatcher),
            discount_threshold,
        )
    }
}
