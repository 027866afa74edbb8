pub mod memory_store;
pub mod sqlite_store;

pub use memory_store::MemoryProductStore;
pub use sqlite_store::SqliteProductStore;

use crate::model::{Product, ProductCandidate, ProductId};

/// Durable home of tracked products.
///
/// Implementations must make every single-record write atomic: a reader never
/// observes a product whose history and stats come from different writes.
/// Read-modify-write sequences spanning several calls are serialised by the
/// caller, not by the store.
#[async_trait::async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_by_url(&self, url: &str) -> anyhow::Result<Option<Product>>;

    async fn find_by_id(&self, id: ProductId) -> anyhow::Result<Option<Product>>;

    /// Create-or-replace keyed on `candidate.url`.
    ///
    /// A new url gets a fresh id; an existing url keeps its id and has every
    /// other field replaced. Returns the canonical stored record.
    async fn upsert_by_url(&self, candidate: &ProductCandidate) -> anyhow::Result<Product>;

    /// Full replace of an existing record. Fails if `product.id` is unknown.
    async fn save(&self, product: &Product) -> anyhow::Result<Product>;

    /// All products in creation order.
    async fn list_all(&self) -> anyhow::Result<Vec<Product>>;

    /// Up to `limit` products other than `id`, in creation order.
    async fn list_excluding(&self, id: ProductId, limit: usize) -> anyhow::Result<Vec<Product>>;
}
