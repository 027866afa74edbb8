use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::ProductStore;
use crate::model::{Product, ProductCandidate, ProductId};

#[derive(Default)]
struct Inner {
    by_id: HashMap<ProductId, Product>,
    by_url: HashMap<String, ProductId>,
    /// Creation order.
    order: Vec<ProductId>,
}

/// In-process store. Every call holds one lock for its whole duration, which
/// gives the same single-record atomicity the SQLite store gets from a
/// transaction.
#[derive(Default, Clone)]
pub struct MemoryProductStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored product in creation order.
    pub async fn snapshot(&self) -> Vec<Product> {
        let guard = self.inner.lock().await;
        guard
            .order
            .iter()
            .filter_map(|id| guard.by_id.get(id).cloned())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn find_by_url(&self, url: &str) -> anyhow::Result<Option<Product>> {
        let guard = self.inner.lock().await;
        Ok(guard
            .by_url
            .get(url)
            .and_then(|id| guard.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: ProductId) -> anyhow::Result<Option<Product>> {
        Ok(self.inner.lock().await.by_id.get(&id).cloned())
    }

    async fn upsert_by_url(&self, candidate: &ProductCandidate) -> anyhow::Result<Product> {
        let mut guard = self.inner.lock().await;

        let id = match guard.by_url.get(&candidate.url) {
            Some(id) => *id,
            None => {
                let id = ProductId::new_v4();
                guard.by_url.insert(candidate.url.clone(), id);
                guard.order.push(id);
                id
            }
        };

        let product = Product::from_candidate(id, candidate.clone());
        guard.by_id.insert(id, product.clone());

        Ok(product)
    }

    async fn save(&self, product: &Product) -> anyhow::Result<Product> {
        let mut guard = self.inner.lock().await;

        let Some(existing) = guard.by_id.get(&product.id) else {
            return Err(anyhow!("product not found: {}", product.id));
        };

        if existing.url != product.url {
            let old_url = existing.url.clone();
            if guard.by_url.contains_key(&product.url) {
                return Err(anyhow!("url already tracked by another product: {}", product.url));
            }
            guard.by_url.remove(&old_url);
            guard.by_url.insert(product.url.clone(), product.id);
        }

        guard.by_id.insert(product.id, product.clone());
        Ok(product.clone())
    }

    async fn list_all(&self) -> anyhow::Result<Vec<Product>> {
        Ok(self.snapshot().await)
    }

    async fn list_excluding(&self, id: ProductId, limit: usize) -> anyhow::Result<Vec<Product>> {
        let guard = self.inner.lock().await;
        Ok(guard
            .order
            .iter()
            .filter(|pid| **pid != id)
            .filter_map(|pid| guard.by_id.get(pid).cloned())
            .take(limit)
            .collect())
    }
}
