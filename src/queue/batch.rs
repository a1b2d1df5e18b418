//! NotificationBatch - the delivery queue element
//!
//! A batch is one matched payload plus the consumer list resolved at
//! enqueue time. Pausing or removing a subscription afterwards does not
//! retroactively pull it out of batches already enqueued.

use crate::processor::Dialect;
use crate::subscription::Subscription;
use serde::{Deserialize, Serialize};

/// Protocol and correlation metadata carried with a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMetadata {
    /// Diagnostic correlation id assigned per inbound message;
    /// not persisted across restarts
    pub track_id: u64,
    /// Processor-assigned message ordinal (one per resolved tuple)
    pub message_id: u64,
    /// Dialect the originating envelope arrived in
    pub dialect: Dialect,
    /// Producer reference from the originating envelope, when present
    pub producer: Option<String>,
    /// Topic element in serialized form, when present
    pub topic: Option<String>,
}

/// One enqueued unit of work: payload plus resolved consumer list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationBatch {
    /// Serialized message payload (opaque to the queue)
    pub payload: String,
    /// Consumers matched at enqueue time
    pub consumers: Vec<Subscription>,
    pub metadata: BatchMetadata,
}

impl NotificationBatch {
    pub fn new(payload: String, consumers: Vec<Subscription>, metadata: BatchMetadata) -> Self {
        Self {
            payload,
            consumers,
            metadata,
        }
    }
}

/// A batch as handed out by `blocking_dequeue`, tagged with the sequence id
/// the queue assigned at enqueue time
#[derive(Debug, Clone)]
pub struct QueuedBatch {
    pub sequence: u64,
    pub batch: NotificationBatch,
}
