//! SqliteProductStore
//! --------------------
//! SQLite-backed implementation of `ProductStore`.
//!
//! One row per product. The append-only price history, the user set and the
//! descriptive fields are stored as JSON columns next to the scalar stats, so
//! every ingestion or registration is a single-row write inside a single
//! transaction: history and stats are always committed together.
//!
//! Prices are persisted as decimal strings (TEXT). SQLite has no decimal type
//! and REAL would reintroduce binary rounding.
use std::str::FromStr;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use super::ProductStore;
use crate::model::{Product, ProductCandidate, ProductDetails, ProductId, UserInterest};
use pricing::Observation;

const SELECT_COLUMNS: &str = r#"
SELECT
  id, url,
  current_price, lowest_price, highest_price, average_price,
  price_history_json, users_json, details_json
FROM products
"#;

/// SQLite-based persistence backend for products.
///
///   - schema creation on startup (`migrate`)
///   - create-or-replace keyed on url (`upsert_by_url`)
///   - full replace keyed on id (`save`)
pub struct SqliteProductStore {
    pool: SqlitePool,
}

impl SqliteProductStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect and ensure the schema exists.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .with_context(|| format!("failed to connect to {database_url}"))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS products (
  id TEXT PRIMARY KEY,
  url TEXT NOT NULL UNIQUE,

  current_price TEXT NOT NULL,
  lowest_price TEXT NOT NULL,
  highest_price TEXT NOT NULL,
  average_price TEXT NOT NULL,

  price_history_json TEXT NOT NULL,
  users_json TEXT NOT NULL,
  details_json TEXT NOT NULL,

  created_at_ms INTEGER NOT NULL,
  updated_at_ms INTEGER NOT NULL
);
"#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create products table")?;

        Ok(())
    }
}

#[async_trait]
impl ProductStore for SqliteProductStore {
    async fn find_by_url(&self, url: &str) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE url = ?;"))
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn find_by_id(&self, id: ProductId) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?;"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    /// INSERT ... ON CONFLICT(url) DO UPDATE, then read back inside the same
    /// transaction:
    /// - new url → inserted with a fresh id
    /// - existing url → every column but `id` / `created_at_ms` replaced
    async fn upsert_by_url(&self, candidate: &ProductCandidate) -> anyhow::Result<Product> {
        let cols = Columns::encode(candidate)?;
        let now_ms = Utc::now().timestamp_millis();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
INSERT INTO products (
  id, url,
  current_price, lowest_price, highest_price, average_price,
  price_history_json, users_json, details_json,
  created_at_ms, updated_at_ms
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(url) DO UPDATE SET
  current_price = excluded.current_price,
  lowest_price = excluded.lowest_price,
  highest_price = excluded.highest_price,
  average_price = excluded.average_price,
  price_history_json = excluded.price_history_json,
  users_json = excluded.users_json,
  details_json = excluded.details_json,
  updated_at_ms = excluded.updated_at_ms;
"#,
        )
        .bind(ProductId::new_v4().to_string())
        .bind(&candidate.url)
        .bind(cols.current_price)
        .bind(cols.lowest_price)
        .bind(cols.highest_price)
        .bind(cols.average_price)
        .bind(cols.price_history_json)
        .bind(cols.users_json)
        .bind(cols.details_json)
        .bind(now_ms)
        .bind(now_ms)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("upsert failed for url {}", candidate.url))?;

        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE url = ?;"))
            .bind(&candidate.url)
            .fetch_one(&mut *tx)
            .await?;
        let stored = row_to_product(&row)?;

        tx.commit().await?;

        Ok(stored)
    }

    async fn save(&self, product: &Product) -> anyhow::Result<Product> {
        let cols = Columns::encode(&product.to_candidate())?;
        let now_ms = Utc::now().timestamp_millis();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
UPDATE products SET
  url = ?,
  current_price = ?,
  lowest_price = ?,
  highest_price = ?,
  average_price = ?,
  price_history_json = ?,
  users_json = ?,
  details_json = ?,
  updated_at_ms = ?
WHERE id = ?;
"#,
        )
        .bind(&product.url)
        .bind(cols.current_price)
        .bind(cols.lowest_price)
        .bind(cols.highest_price)
        .bind(cols.average_price)
        .bind(cols.price_history_json)
        .bind(cols.users_json)
        .bind(cols.details_json)
        .bind(now_ms)
        .bind(product.id.to_string())
        .execute(&mut *tx)
        .await
        .with_context(|| format!("save failed for product {}", product.id))?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("product not found: {}", product.id));
        }

        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?;"))
            .bind(product.id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        let stored = row_to_product(&row)?;

        tx.commit().await?;

        Ok(stored)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<Product>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY created_at_ms, rowid;"))
            .fetch_all(&self.pool)
            .await?;

        Ok(decode_rows(rows))
    }

    async fn list_excluding(&self, id: ProductId, limit: usize) -> anyhow::Result<Vec<Product>> {
        let limit = i64::try_from(limit).context("limit does not fit in i64")?;

        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE id != ? ORDER BY created_at_ms, rowid LIMIT ?;"
        ))
        .bind(id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_rows(rows))
    }
}

/* =========================
Row mapping + conversions
========================= */

/// Column values for one product, already encoded for binding.
struct Columns {
    current_price: String,
    lowest_price: String,
    highest_price: String,
    average_price: String,
    price_history_json: String,
    users_json: String,
    details_json: String,
}

impl Columns {
    fn encode(c: &ProductCandidate) -> anyhow::Result<Self> {
        Ok(Self {
            current_price: c.current_price.to_string(),
            lowest_price: c.lowest_price.to_string(),
            highest_price: c.highest_price.to_string(),
            average_price: c.average_price.to_string(),
            price_history_json: serde_json::to_string(&c.price_history)?,
            users_json: serde_json::to_string(&c.users)?,
            details_json: serde_json::to_string(&c.details)?,
        })
    }
}

fn decode_rows(rows: Vec<SqliteRow>) -> Vec<Product> {
    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        match row_to_product(&r) {
            Ok(p) => out.push(p),
            Err(e) => {
                // poison-row resilience: skip but don't fail the listing
                tracing::warn!(error = %e, "skipping malformed product row");
            }
        }
    }
    out
}

fn row_to_product(r: &SqliteRow) -> anyhow::Result<Product> {
    let id_str: String = r.try_get("id")?;
    let id = ProductId::parse_str(&id_str).context("invalid product id")?;

    let price_history: Vec<Observation> =
        serde_json::from_str(r.try_get::<&str, _>("price_history_json")?)
            .context("invalid price_history_json")?;
    let users: Vec<UserInterest> = serde_json::from_str(r.try_get::<&str, _>("users_json")?)
        .context("invalid users_json")?;
    let details: ProductDetails = serde_json::from_str(r.try_get::<&str, _>("details_json")?)
        .context("invalid details_json")?;

    Ok(Product {
        id,
        url: r.try_get("url")?,
        current_price: decimal_col(r, "current_price")?,
        lowest_price: decimal_col(r, "lowest_price")?,
        highest_price: decimal_col(r, "highest_price")?,
        average_price: decimal_col(r, "average_price")?,
        price_history,
        users,
        details,
    })
}

fn decimal_col(r: &SqliteRow, col: &str) -> anyhow::Result<Decimal> {
    let raw: &str = r.try_get(col)?;
    Decimal::from_str(raw).with_context(|| format!("invalid decimal in {col}: {raw}"))
}
