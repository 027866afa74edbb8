use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pricing::{MergedHistory, Observation};

pub type ProductId = uuid::Uuid;

/// Descriptive fields copied from the newest scrape on every ingestion.
///
/// Opaque to the pricing pipeline; only the notification templates read them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductDetails {
    pub title: String,
    pub image: String,
    pub currency: String,
    pub original_price: Option<Decimal>,
    pub discount_rate: Option<Decimal>,
    pub description: String,
    pub category: String,
    pub reviews_count: u64,
    pub stars: Option<Decimal>,
    pub is_out_of_stock: bool,
}

/// A user registered against a product. Unique by `email` within a product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInterest {
    pub email: String,
}

impl UserInterest {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

/// Structured result of scraping one listing page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedProduct {
    pub url: String,
    pub current_price: Decimal,
    #[serde(default)]
    pub details: ProductDetails,
}

/// Everything a store needs to create or replace a product, minus the id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductCandidate {
    pub url: String,
    pub current_price: Decimal,
    pub price_history: Vec<Observation>,
    pub lowest_price: Decimal,
    pub highest_price: Decimal,
    pub average_price: Decimal,
    pub users: Vec<UserInterest>,
    pub details: ProductDetails,
}

impl ProductCandidate {
    /// Combine a fresh scrape with a merged history.
    ///
    /// `current_price` and the three stats always come from `merged`, so they
    /// can never disagree with the history being written.
    pub fn from_scrape(
        snapshot: ScrapedProduct,
        merged: MergedHistory,
        users: Vec<UserInterest>,
    ) -> Self {
        let current_price = merged.current_price().unwrap_or(snapshot.current_price);

        Self {
            url: snapshot.url,
            current_price,
            lowest_price: merged.stats.lowest,
            highest_price: merged.stats.highest,
            average_price: merged.stats.average,
            price_history: merged.history,
            users,
            details: snapshot.details,
        }
    }
}

/// A tracked product as held by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub url: String,
    pub current_price: Decimal,
    pub price_history: Vec<Observation>,
    pub lowest_price: Decimal,
    pub highest_price: Decimal,
    pub average_price: Decimal,
    pub users: Vec<UserInterest>,
    pub details: ProductDetails,
}

impl Product {
    pub fn from_candidate(id: ProductId, c: ProductCandidate) -> Self {
        Self {
            id,
            url: c.url,
            current_price: c.current_price,
            price_history: c.price_history,
            lowest_price: c.lowest_price,
            highest_price: c.highest_price,
            average_price: c.average_price,
            users: c.users,
            details: c.details,
        }
    }

    pub fn to_candidate(&self) -> ProductCandidate {
        ProductCandidate {
            url: self.url.clone(),
            current_price: self.current_price,
            price_history: self.price_history.clone(),
            lowest_price: self.lowest_price,
            highest_price: self.highest_price,
            average_price: self.average_price,
            users: self.users.clone(),
            details: self.details.clone(),
        }
    }

    /// Exact, case-sensitive membership check.
    pub fn has_user(&self, email: &str) -> bool {
        self.users.iter().any(|u| u.email == email)
    }

    pub fn emails(&self) -> Vec<String> {
        self.users.iter().map(|u| u.email.clone()).collect()
    }
}
