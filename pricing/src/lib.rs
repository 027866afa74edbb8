pub mod merger;
pub mod stats;
pub mod types;

pub use merger::{MergedHistory, merge};
pub use stats::{
    EmptyHistoryError, PriceStats, StatsError, average_price, highest_price,
    lowest_price,
};
pub use types::{Observation, PriceHistoryEntry};
