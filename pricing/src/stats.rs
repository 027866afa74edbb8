//! Summary statistics over a price history.
//!
//! Everything here is pure and synchronous. Stats are always derived from the
//! entire history that is passed in; nothing is adjusted incrementally, so a
//! retried recompute can never drift from the history it describes.
//!
//! Arithmetic uses `rust_decimal::Decimal` end to end. Long histories of
//! prices like `19.99` accumulate no binary rounding error in the sum, and the
//! only rounding step is the final division for the mean. The sum is
//! accumulated with checked addition; a history whose total leaves `Decimal`'s
//! range is reported as [`StatsError::Overflow`].

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::Observation;

/// Raised when stats are requested for a history with zero observations.
///
/// Callers always append the new observation before computing stats, so
/// hitting this is a contract violation rather than a recoverable state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("price statistics requested for an empty history")]
pub struct EmptyHistoryError;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsError {
    #[error(transparent)]
    Empty(#[from] EmptyHistoryError),

    /// The running sum of prices does not fit in a `Decimal`.
    #[error("price sum overflowed after {observations} observations")]
    Overflow { observations: usize },
}

/// Lowest / highest / mean price over a non-empty history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceStats {
    pub lowest: Decimal,
    pub highest: Decimal,
    pub average: Decimal,
}

impl PriceStats {
    /// Compute all three stats in a single pass.
    ///
    /// Ties in min/max keep the first occurrence (strict comparisons).
    pub fn from_history(history: &[Observation]) -> Result<Self, StatsError> {
        let (first, rest) = history.split_first().ok_or(EmptyHistoryError)?;

        let mut lowest = first.price;
        let mut highest = first.price;
        let mut sum = first.price;

        for obs in rest {
            if obs.price < lowest {
                lowest = obs.price;
            }
            if obs.price > highest {
                highest = obs.price;
            }
            sum = sum.checked_add(obs.price).ok_or(StatsError::Overflow {
                observations: history.len(),
            })?;
        }

        let average = sum
            .checked_div(Decimal::from(history.len()))
            .ok_or(StatsError::Overflow {
                observations: history.len(),
            })?;

        Ok(Self {
            lowest,
            highest,
            average,
        })
    }
}

pub fn lowest_price(history: &[Observation]) -> Result<Decimal, StatsError> {
    PriceStats::from_history(history).map(|s| s.lowest)
}

pub fn highest_price(history: &[Observation]) -> Result<Decimal, StatsError> {
    PriceStats::from_history(history).map(|s| s.highest)
}

pub fn average_price(history: &[Observation]) -> Result<Decimal, StatsError> {
    PriceStats::from_history(history).map(|s| s.average)
}
