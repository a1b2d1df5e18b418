//! Durable Delivery Queue
//!
//! FIFO store decoupling publishers from consumers: the notification
//! processor enqueues matched batches synchronously, delivery strategies
//! dequeue them on independent background tasks. Two interchangeable
//! backends sit behind the `DeliveryQueue` trait:
//!
//! - `MemoryQueue`: in-process ordered buffer, pending batches are lost on
//!   crash; used when durability is explicitly disabled.
//! - `DurableQueue`: SQLite-backed store with two singleton counter rows
//!   (high-water / low-water marks) updated under write transactions so
//!   multiple broker processes sharing one store never assign the same
//!   sequence id and never dequeue the same row twice.
//!
//! Sequence ids are strictly increasing and dense within one queue
//! instance; a batch becomes visible to dequeue only once its insert is
//! committed. Retrieval (`blocking_dequeue`) and removal
//! (`mark_processed`) are two separate, not atomic, steps.

mod batch;
mod durable;
mod error;
mod memory;
mod traits;

pub use batch::{BatchMetadata, NotificationBatch, QueuedBatch};
pub use durable::DurableQueue;
pub use error::{QueueError, QueueResult};
pub use memory::MemoryQueue;
pub use traits::DeliveryQueue;

use std::time::Duration;

/// Step added to the empty-poll backoff after each miss
pub const WAIT_STEP: Duration = Duration::from_millis(1000);
/// Backoff cap for an empty queue
pub const FINAL_WAIT: Duration = Duration::from_millis(5000);

/// Next empty-poll wait: grows by one step per miss, saturating at the cap
pub fn next_wait(wait: Duration) -> Duration {
    (wait + WAIT_STEP).min(FINAL_WAIT)
}
