//! Downstream notification that a product's stored state changed.
//!
//! The pipeline does not own any cache. It only announces the id of every
//! product it has just written; whoever renders or caches product views
//! subscribes and decides what to drop.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use catalog::ProductId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidationEvent {
    ProductChanged(ProductId),
}

pub trait InvalidationSink: Send + Sync {
    /// Called after a successful write. Must not block.
    fn invalidate(&self, product_id: ProductId);
}

/// Forwards events into a bounded channel.
///
/// When the consumer lags or is gone the event is dropped with a warning;
/// invalidation is best-effort and must never fail an ingestion.
#[derive(Clone)]
pub struct ChannelInvalidation {
    tx: mpsc::Sender<InvalidationEvent>,
}

impl ChannelInvalidation {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<InvalidationEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl InvalidationSink for ChannelInvalidation {
    fn invalidate(&self, product_id: ProductId) {
        match self.tx.try_send(InvalidationEvent::ProductChanged(product_id)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%product_id, "invalidation queue full; event dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(%product_id, "invalidation consumer gone; event dropped");
            }
        }
    }
}
