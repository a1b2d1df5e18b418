//! Delivery queue contract shared by both backends

use crate::queue::batch::{NotificationBatch, QueuedBatch};
use crate::queue::error::QueueResult;
use async_trait::async_trait;

/// FIFO store for matched-but-undelivered notification batches
///
/// Enqueue is synchronous from the publisher's point of view: the call
/// returns only after the batch is durably recorded (or fails). Dequeue is
/// driven by the delivery strategies on background tasks.
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    /// Append a batch and return the sequence id assigned to it
    async fn enqueue(&self, batch: NotificationBatch) -> QueueResult<u64>;

    /// Claim the next batch if one is available, without waiting
    ///
    /// Claiming a batch advances the queue past it; the row itself is only
    /// removed by `mark_processed`. The two steps are deliberately not
    /// atomic: a crash in between leaves the batch neither revisited nor
    /// deleted (accepted at-most-once risk of this design). Callers must
    /// await the returned future to completion — cancelling it can abandon
    /// a claim that already committed.
    async fn try_dequeue(&self) -> QueueResult<Option<QueuedBatch>>;

    /// Wait until a batch is available and hand it out
    ///
    /// Same claim semantics as `try_dequeue`, with the backend's own wait
    /// (backoff polling or a wakeup) while the queue is empty.
    async fn blocking_dequeue(&self) -> QueueResult<QueuedBatch>;

    /// Remove a batch's backing entry after its deliveries were attempted
    async fn mark_processed(&self, sequence: u64) -> QueueResult<()>;

    /// Number of entries currently held (including handed-out, undeleted rows)
    async fn size(&self) -> QueueResult<usize>;

    /// Drop all pending entries; used only on controlled restart
    async fn cleanup(&self) -> QueueResult<()>;
}
