//! Periodic re-ingestion of every tracked product.
//!
//! Each pass scrapes every stored url (plus any configured seeds) once. Urls
//! are processed independently: a failure on one is logged and the pass moves
//! on. After each stored ingestion the users tracking that product may get a
//! follow-up notification, decided by [`notification_kind_for`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{Instrument, error, info, warn};

use catalog::{Product, ProductStore};
use common::logger::{TraceId, child_span, root_span};

use crate::notify::{DispatchReport, NotificationDispatcher, NotificationKind};
use crate::upsert::ProductUpsert;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub stored: usize,
    pub skipped: usize,
    pub failed: usize,
    pub notified: usize,
}

/// Which follow-up, if any, an ingestion calls for.
///
/// Checked in order: new all-time low, back in stock, discount threshold.
/// A product seen for the first time has nobody to notify yet.
pub fn notification_kind_for(
    previous: Option<&Product>,
    current: &Product,
    discount_threshold: Decimal,
) -> Option<NotificationKind> {
    let previous = previous?;

    if current.current_price < previous.lowest_price {
        return Some(NotificationKind::LowestPrice);
    }

    if previous.details.is_out_of_stock && !current.details.is_out_of_stock {
        return Some(NotificationKind::ChangeOfStock);
    }

    if current
        .details
        .discount_rate
        .is_some_and(|rate| rate >= discount_threshold)
    {
        return Some(NotificationKind::ThresholdMet {
            threshold: discount_threshold,
        });
    }

    None
}

pub struct RefreshJob {
    upsert: Arc<ProductUpsert>,
    store: Arc<dyn ProductStore>,
    dispatcher: Arc<NotificationDispatcher>,
    discount_threshold: Decimal,
}

impl RefreshJob {
    pub fn new(
        upsert: Arc<ProductUpsert>,
        store: Arc<dyn ProductStore>,
        dispatcher: Arc<NotificationDispatcher>,
        discount_threshold: Decimal,
    ) -> Self {
        Self {
            upsert,
            store,
            dispatcher,
            discount_threshold,
        }
    }

    /// One pass over stored urls followed by any `seeds` not stored yet.
    pub async fn run_once(&self, seeds: &[String]) -> RefreshSummary {
        let trace_id = TraceId::new();
        self.pass(seeds).instrument(root_span("refresh", &trace_id)).await
    }

    async fn pass(&self, seeds: &[String]) -> RefreshSummary {
        let mut summary = RefreshSummary::default();

        let stored = match self.store.list_all().await {
            Ok(products) => products,
            Err(e) => {
                // Seeds can still be ingested without the listing.
                error!(error = ?e, "failed to list tracked products");
                Vec::new()
            }
        };

        let mut seen = HashSet::new();
        let urls: Vec<String> = stored
            .into_iter()
            .map(|p| p.url)
            .chain(seeds.iter().cloned())
            .filter(|u| seen.insert(u.clone()))
            .collect();

        for url in urls {
            let span = child_span("refresh_url");
            span.record("url", url.as_str());

            match self.upsert.upsert_tracked(&url).instrument(span).await {
                Ok(Some(ingestion)) => {
                    summary.stored += 1;

                    let kind = notification_kind_for(
                        ingestion.previous.as_ref(),
                        &ingestion.product,
                        self.discount_threshold,
                    );

                    if let Some(kind) = kind {
                        let report = self.dispatcher.notify_users(&ingestion.product, kind).await;
                        if report == DispatchReport::Delivered {
                            summary.notified += 1;
                        }
                    }
                }
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(url = %url, error = %e, "refresh ingestion failed");
                }
            }
        }

        info!(
            stored = summary.stored,
            skipped = summary.skipped,
            failed = summary.failed,
            notified = summary.notified,
            "refresh pass complete"
        );

        summary
    }

    /// Run a pass every `interval` until the task is dropped. Seeds are only
    /// used on the first pass; after that they are tracked like any product.
    pub async fn run(self: Arc<Self>, interval: Duration, seeds: Vec<String>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut seeds = Some(seeds);

        loop {
            ticker.tick().await;

            let summary = self.run_once(&seeds.take().unwrap_or_default()).await;
            if summary.failed > 0 {
                warn!(failed = summary.failed, "refresh pass finished with failures");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{ProductCandidate, ProductDetails, ProductId, ScrapedProduct};
    use pricing::{Observation, merge};

    fn product(prices: &[i64], out_of_stock: bool, discount: Option<i64>) -> Product {
        let mut history = Vec::new();
        let mut merged = None;
        for cents in prices {
            let m = merge(&history, Observation::new(Decimal::new(*cents, 2))).unwrap();
            history = m.history.clone();
            merged = Some(m);
        }
        let merged = merged.unwrap();
        let snapshot = ScrapedProduct {
            url: "https://shop.example/p".into(),
            current_price: merged.current_price().unwrap(),
            details: ProductDetails {
                is_out_of_stock: out_of_stock,
                discount_rate: discount.map(Decimal::from),
                ..Default::default()
            },
        };
        Product::from_candidate(
            ProductId::nil(),
            ProductCandidate::from_scrape(snapshot, merged, vec![]),
        )
    }

    fn threshold() -> Decimal {
        Decimal::from(40)
    }

    #[test]
    fn first_ingestion_triggers_nothing() {
        let current = product(&[1000], false, Some(90));
        assert_eq!(notification_kind_for(None, &current, threshold()), None);
    }

    #[test]
    fn new_low_wins_over_everything() {
        let previous = product(&[1000, 1200], true, None);
        let current = product(&[1000, 1200, 900], false, Some(50));

        assert_eq!(
            notification_kind_for(Some(&previous), &current, threshold()),
            Some(NotificationKind::LowestPrice)
        );
    }

    #[test]
    fn equal_to_previous_low_is_not_a_new_low() {
        let previous = product(&[1000, 1200], false, None);
        let current = product(&[1000, 1200, 1000], false, None);

        assert_eq!(notification_kind_for(Some(&previous), &current, threshold()), None);
    }

    #[test]
    fn restock_is_detected() {
        let previous = product(&[1000], true, None);
        let current = product(&[1000, 1100], false, None);

        assert_eq!(
            notification_kind_for(Some(&previous), &current, threshold()),
            Some(NotificationKind::ChangeOfStock)
        );
    }

    #[test]
    fn discount_at_threshold_triggers() {
        let previous = product(&[1000], false, None);
        let current = product(&[1000, 1000], false, Some(40));

        assert_eq!(
            notification_kind_for(Some(&previous), &current, threshold()),
            Some(NotificationKind::ThresholdMet {
                threshold: threshold()
            })
        );
    }

    #[test]
    fn discount_below_threshold_is_quiet() {
        let previous = product(&[1000], false, None);
        let current = product(&[1000, 1000], false, Some(39));

        assert_eq!(notification_kind_for(Some(&previous), &current, threshold()), None);
    }
}
