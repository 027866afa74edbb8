use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single price reading.
///
/// `observed_at` is informational only. Ordering within a history is the
/// insertion order of the sequence, never this timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            observed_at: Utc::now(),
        }
    }

    pub fn at(price: Decimal, observed_at: DateTime<Utc>) -> Self {
        Self { price, observed_at }
    }
}

/// Observation as stored inside a product's price history.
pub type PriceHistoryEntry = Observation;
