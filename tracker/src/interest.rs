use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

use catalog::{Product, ProductId, ProductStore, UserInterest};
use common::logger::warn_if_slow;

use crate::error::{TrackerError, store_err};
use crate::locks::KeyedLocks;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationOutcome {
    AlreadyRegistered,
    NewlyRegistered,
}

/// Result of a registration: the product as stored afterwards, plus whether
/// this call added the user.
#[derive(Clone, Debug)]
pub struct Registration {
    pub product: Product,
    pub outcome: RegistrationOutcome,
}

/// Tracks which users follow which product.
///
/// Membership only grows and is unique per email (exact, case-sensitive
/// match). The check-then-append runs under the product's lock, shared with
/// ingestion, so two callers can never both see "absent" and both append.
pub struct InterestRegistry {
    store: Arc<dyn ProductStore>,
    locks: Arc<KeyedLocks>,
}

impl InterestRegistry {
    pub fn new(store: Arc<dyn ProductStore>, locks: Arc<KeyedLocks>) -> Self {
        Self { store, locks }
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn register_interest(
        &self,
        product_id: ProductId,
        user_email: &str,
    ) -> Result<Registration, TrackerError> {
        // Resolve the url first: the lock is keyed on it.
        let url = self
            .load(product_id)
            .await?
            .ok_or(TrackerError::ProductNotFound(product_id))?
            .url;

        let _guard = self.locks.lock(&url).await;

        // Re-read inside the lock; anything seen before it may be stale.
        let mut product = self
            .load(product_id)
            .await?
            .ok_or(TrackerError::ProductNotFound(product_id))?;

        if product.has_user(user_email) {
            debug!("user already registered");
            return Ok(Registration {
                product,
                outcome: RegistrationOutcome::AlreadyRegistered,
            });
        }

        product.users.push(UserInterest::new(user_email));

        let saved = warn_if_slow("db_save", Duration::from_millis(100), async {
            self.store.save(&product).await
        })
        .await
        .map_err(store_err("save", product_id))?;

        info!(users = saved.users.len(), "user registered for product");

        Ok(Registration {
            product: saved,
            outcome: RegistrationOutcome::NewlyRegistered,
        })
    }

    async fn load(&self, product_id: ProductId) -> Result<Option<Product>, TrackerError> {
        warn_if_slow("db_find_by_id", Duration::from_millis(100), async {
            self.store.find_by_id(product_id).await
        })
        .await
        .map_err(store_err("find_by_id", product_id))
    }
}
