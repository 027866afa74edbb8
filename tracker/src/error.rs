use thiserror::Error;

use catalog::ProductId;
use pricing::StatsError;

/// Failures surfaced by ingestion and registration.
///
/// A scrape that produced nothing is not an error; see `UpsertOutcome::Skipped`.
/// Notification failures never appear here; see `DispatchReport`.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Persistence or connectivity failure, with the store call and the
    /// url / id it was made for.
    #[error("store {op} failed for {key}: {source:#}")]
    Store {
        op: &'static str,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// Stats could not be derived from the merged history: an empty history
    /// (a defect) or prices whose sum is out of range. Nothing was written.
    #[error(transparent)]
    Stats(#[from] StatsError),
}

impl TrackerError {
    pub fn is_store(&self) -> bool {
        matches!(self, TrackerError::Store { .. })
    }
}

/// Build a `map_err` adapter that wraps a store failure with its context.
pub(crate) fn store_err(
    op: &'static str,
    key: impl ToString,
) -> impl FnOnce(anyhow::Error) -> TrackerError {
    let key = key.to_string();
    move |source| TrackerError::Store { op, key, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_includes_context_and_cause() {
        let err = store_err("find_by_url", "https://shop.example/a")(anyhow::anyhow!(
            "Database Offline"
        ));

        let msg = err.to_string();
        assert!(msg.contains("find_by_url"));
        assert!(msg.contains("https://shop.example/a"));
        assert!(msg.contains("Database Offline"));
        assert!(err.is_store());
    }

    #[test]
    fn stats_failure_is_not_a_store_error() {
        let err = TrackerError::from(StatsError::Overflow { observations: 2 });
        assert!(!err.is_store());
        assert!(err.to_string().contains("overflowed"));
    }

    #[test]
    fn product_not_found_is_not_a_store_error() {
        let err = TrackerError::ProductNotFound(ProductId::nil());
        assert!(!err.is_store());
    }
}
