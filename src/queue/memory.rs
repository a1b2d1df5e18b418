//! Volatile in-process queue backend
//!
//! An ordered buffer guarded by a mutex with a `Notify` wakeup for waiting
//! delivery loops. All pending batches are lost on crash; selected only
//! when durability is explicitly disabled.

use crate::queue::batch::{NotificationBatch, QueuedBatch};
use crate::queue::error::QueueResult;
use crate::queue::traits::DeliveryQueue;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

struct MemoryState {
    /// Next sequence id to assign on enqueue
    next_sequence: u64,
    ready: VecDeque<QueuedBatch>,
}

pub struct MemoryQueue {
    state: Mutex<MemoryState>,
    available: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_sequence: 1,
                ready: VecDeque::new(),
            }),
            available: Notify::new(),
        }
    }

    fn pop(&self) -> Option<QueuedBatch> {
        let mut state = self.state.lock().unwrap();
        state.ready.pop_front()
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryQueue for MemoryQueue {
    async fn enqueue(&self, batch: NotificationBatch) -> QueueResult<u64> {
        let mut state = self.state.lock().unwrap();
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.ready.push_back(QueuedBatch { sequence, batch });
        drop(state);

        self.available.notify_one();
        Ok(sequence)
    }

    async fn try_dequeue(&self) -> QueueResult<Option<QueuedBatch>> {
        Ok(self.pop())
    }

    async fn blocking_dequeue(&self) -> QueueResult<QueuedBatch> {
        loop {
            // Arm the notification before checking, so an enqueue racing
            // with the emptiness check cannot be missed.
            let notified = self.available.notified();
            if let Some(entry) = self.pop() {
                return Ok(entry);
            }
            notified.await;
        }
    }

    async fn mark_processed(&self, _sequence: u64) -> QueueResult<()> {
        // The volatile backend removes entries at dequeue time; nothing to
        // delete here. Kept for contract parity with the durable backend.
        Ok(())
    }

    async fn size(&self) -> QueueResult<usize> {
        let state = self.state.lock().unwrap();
        Ok(state.ready.len())
    }

    async fn cleanup(&self) -> QueueResult<()> {
        let mut state = self.state.lock().unwrap();
        let dropped = state.ready.len();
        state.ready.clear();
        if dropped > 0 {
            log::info!("Dropped {dropped} pending batches from the volatile queue");
        }
        Ok(())
    }
}
