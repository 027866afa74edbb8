//! Merge a fresh observation into an existing price history.
//!
//! The merge always appends. Repeated prices are legitimate readings and are
//! counted like any other observation; there is no deduplication here.
//!
//! Stats are recomputed over the full merged history via [`PriceStats`], so a
//! first-time product (empty existing history) goes through exactly the same
//! path as a product with years of readings.

use crate::stats::{PriceStats, StatsError};
use crate::types::Observation;

/// Updated history plus the stats derived from it.
///
/// Returned as one value so callers cannot persist a history without the
/// matching stats (or the other way around).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedHistory {
    pub history: Vec<Observation>,
    pub stats: PriceStats,
}

impl MergedHistory {
    /// Price of the most recent observation.
    pub fn current_price(&self) -> Option<rust_decimal::Decimal> {
        self.history.last().map(|o| o.price)
    }
}

/// Append `new` to `existing` and recompute stats over the result.
///
/// Deterministic and side-effect free. `existing` is left untouched.
pub fn merge(
    existing: &[Observation],
    new: Observation,
) -> Result<MergedHistory, StatsError> {
    let mut history = Vec::with_capacity(existing.len() + 1);
    history.extend_from_slice(existing);
    history.push(new);

    let stats = PriceStats::from_history(&history)?;

    Ok(MergedHistory { history, stats })
}
