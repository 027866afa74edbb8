use std::sync::Arc;

use catalog::{Product, ProductId, ProductStore};

use crate::error::{TrackerError, store_err};

/// Number of products returned by [`ProductQueries::get_similar_products`].
pub const SIMILAR_PRODUCTS_LIMIT: usize = 3;

/// Read-only views over the store.
#[derive(Clone)]
pub struct ProductQueries {
    store: Arc<dyn ProductStore>,
}

impl ProductQueries {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }

    pub async fn get_product_by_id(&self, id: ProductId) -> Result<Option<Product>, TrackerError> {
        self.store
            .find_by_id(id)
            .await
            .map_err(store_err("find_by_id", id))
    }

    pub async fn get_all_products(&self) -> Result<Vec<Product>, TrackerError> {
        self.store
            .list_all()
            .await
            .map_err(store_err("list_all", "*"))
    }

    /// Other tracked products to show next to `id`.
    ///
    /// `None` when `id` itself is unknown.
    pub async fn get_similar_products(
        &self,
        id: ProductId,
    ) -> Result<Option<Vec<Product>>, TrackerError> {
        if self.get_product_by_id(id).await?.is_none() {
            return Ok(None);
        }

        self.store
            .list_excluding(id, SIMILAR_PRODUCTS_LIMIT)
            .await
            .map(Some)
            .map_err(store_err("list_excluding", id))
    }
}
