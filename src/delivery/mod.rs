//! Delivery strategies
//!
//! A `DeliveryService` runs one background loop: dequeue a batch, attempt
//! a delivery per consumer in it, mark the batch processed. Three
//! interchangeable modes trade throughput against resource bound:
//!
//! - `Serial`: one attempt at a time, strictly in dequeue order. A slow
//!   consumer delays subsequent batches — by design, this is the only mode
//!   allowed to.
//! - `Parallel`: one spawned task per attempt, no upper bound. Maximum
//!   throughput; slow consumers accumulate in-flight tasks.
//! - `FixedParallel`: attempts admitted through a bounded worker pool.
//!   Dequeue proceeds independently of delivery completion, but admission
//!   waits once the pool is saturated. Recommended production default.
//!
//! One consumer's failure never affects its siblings nor the batch's
//! `mark_processed`: attempts are best-effort, failures are logged, no
//! retry exists in this core.
//!
//! The loop polls the queue with `try_dequeue` and an increasing backoff
//! while empty; shutdown interrupts the wait, never an in-flight claim, so
//! a batch the store has handed out is always dispatched before the loop
//! stops.

mod error;
mod sender;

pub use error::{DeliveryError, DeliveryResult};
pub use sender::{DeliverySender, HttpSender, PRODUCER_HEADER, TOPIC_HEADER, TRACK_ID_HEADER};

use crate::queue::{next_wait, DeliveryQueue, NotificationBatch, QueueError, WAIT_STEP};
use crate::subscription::Subscription;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

/// How long shutdown waits for in-flight delivery tasks to finish
const DRAIN_DEADLINE: Duration = Duration::from_secs(30);

/// Dispatcher concurrency mode, selected once at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Serial,
    Parallel,
    FixedParallel { workers: usize },
}

/// Background dispatcher draining the delivery queue
pub struct DeliveryService {
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl DeliveryService {
    /// Start the delivery loop on a background task
    pub fn spawn(
        queue: Arc<dyn DeliveryQueue>,
        sender: Arc<dyn DeliverySender>,
        mode: DeliveryMode,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(queue, sender, mode, shutdown_rx));
        log::info!("Delivery service started in {mode:?} mode");
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Stop dequeuing and wait for in-flight deliveries to drain
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if tokio::time::timeout(DRAIN_DEADLINE, self.handle)
            .await
            .is_err()
        {
            log::warn!(
                "Delivery service did not drain within {}s, abandoning in-flight tasks",
                DRAIN_DEADLINE.as_secs()
            );
        } else {
            log::info!("Delivery service stopped");
        }
    }
}

async fn run_loop(
    queue: Arc<dyn DeliveryQueue>,
    sender: Arc<dyn DeliverySender>,
    mode: DeliveryMode,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut in_flight: JoinSet<()> = JoinSet::new();
    // Worker pool; only the fixed-parallel mode admits through it
    let pool = match mode {
        DeliveryMode::FixedParallel { workers } => Arc::new(Semaphore::new(workers.max(1))),
        _ => Arc::new(Semaphore::new(1)),
    };
    let mut wait = WAIT_STEP;

    // A claim is never raced against shutdown: `try_dequeue` is awaited to
    // completion, so a batch the store already handed out is always
    // dispatched and marked. Shutdown interrupts only the empty-queue wait
    // and the gap between batches.
    loop {
        let entry = match queue.try_dequeue().await {
            Ok(Some(entry)) => {
                wait = WAIT_STEP;
                entry
            }
            Ok(None) => {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
                wait = next_wait(wait);
                continue;
            }
            Err(err @ QueueError::CountersMissing) => {
                log::error!("Delivery loop cannot dequeue, stopping: {err}");
                break;
            }
            Err(err) => {
                // Store connectivity problems are survivable; keep retrying
                // and recover once the store returns.
                log::error!("Dequeue failed, backing off and retrying: {err}");
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
                wait = next_wait(wait);
                continue;
            }
        };

        // Reap finished tasks so the set does not grow without bound
        while in_flight.try_join_next().is_some() {}

        let batch = Arc::new(entry.batch);
        match mode {
            DeliveryMode::Serial => {
                // All consumers of batch N complete before batch N+1 starts
                for subscription in &batch.consumers {
                    attempt(&*sender, subscription, &batch).await;
                }
            }
            DeliveryMode::Parallel => {
                for subscription in batch.consumers.clone() {
                    let sender = sender.clone();
                    let batch = batch.clone();
                    in_flight.spawn(async move {
                        attempt(&*sender, &subscription, &batch).await;
                    });
                }
            }
            DeliveryMode::FixedParallel { .. } => {
                for subscription in batch.consumers.clone() {
                    // Admission waits here once the pool is saturated; a
                    // hung attempt therefore never blocks more than its
                    // share of workers.
                    let Ok(permit) = pool.clone().acquire_owned().await else {
                        break;
                    };
                    let sender = sender.clone();
                    let batch = batch.clone();
                    in_flight.spawn(async move {
                        attempt(&*sender, &subscription, &batch).await;
                        drop(permit);
                    });
                }
            }
        }

        // Processed means "all attempts made or admitted", independent of
        // their outcomes.
        if let Err(err) = queue.mark_processed(entry.sequence).await {
            log::error!("Could not mark batch {} processed: {err}", entry.sequence);
        }

        if *shutdown_rx.borrow() {
            break;
        }
    }

    while in_flight.join_next().await.is_some() {}
}

/// One delivery attempt; the outcome never propagates past the log
async fn attempt(sender: &dyn DeliverySender, subscription: &Subscription, batch: &NotificationBatch) {
    match sender.deliver(subscription, batch).await {
        Ok(()) => log::debug!(
            "Delivered batch (track id {}) to {}",
            batch.metadata.track_id,
            subscription.consumer_address
        ),
        Err(err) => log::warn!(
            "Delivery of batch (track id {}) to subscription '{}' failed: {err}",
            batch.metadata.track_id,
            subscription.id
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::Dialect;
    use crate::queue::{BatchMetadata, DurableQueue, MemoryQueue, QueueResult, QueuedBatch};
    use crate::subscription::{Subscription, SubscriptionKind};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Sender double recording every attempt; addresses listed in
    /// `failing` report a failed attempt.
    struct RecordingSender {
        delivered: Mutex<Vec<String>>,
        failing: HashSet<String>,
    }

    impl RecordingSender {
        fn new(failing: &[&str]) -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
                failing: failing.iter().map(|s| s.to_string()).collect(),
            }
        }

        fn attempts(&self) -> Vec<String> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeliverySender for RecordingSender {
        async fn deliver(
            &self,
            subscription: &Subscription,
            _batch: &NotificationBatch,
        ) -> DeliveryResult<()> {
            self.delivered
                .lock()
                .unwrap()
                .push(subscription.consumer_address.clone());
            if self.failing.contains(&subscription.consumer_address) {
                Err(DeliveryError::Failed {
                    message: "connection refused".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    /// Queue wrapper recording which sequences were marked processed
    struct TrackingQueue {
        inner: MemoryQueue,
        processed: Mutex<Vec<u64>>,
    }

    impl TrackingQueue {
        fn new() -> Self {
            Self {
                inner: MemoryQueue::new(),
                processed: Mutex::new(Vec::new()),
            }
        }

        fn processed(&self) -> Vec<u64> {
            self.processed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeliveryQueue for TrackingQueue {
        async fn enqueue(&self, batch: NotificationBatch) -> QueueResult<u64> {
            self.inner.enqueue(batch).await
        }
        async fn try_dequeue(&self) -> QueueResult<Option<QueuedBatch>> {
            self.inner.try_dequeue().await
        }
        async fn blocking_dequeue(&self) -> QueueResult<QueuedBatch> {
            self.inner.blocking_dequeue().await
        }
        async fn mark_processed(&self, sequence: u64) -> QueueResult<()> {
            self.processed.lock().unwrap().push(sequence);
            self.inner.mark_processed(sequence).await
        }
        async fn size(&self) -> QueueResult<usize> {
            self.inner.size().await
        }
        async fn cleanup(&self) -> QueueResult<()> {
            self.inner.cleanup().await
        }
    }

    fn batch_for(consumers: &[&str]) -> NotificationBatch {
        let consumers = consumers
            .iter()
            .map(|address| {
                Subscription::new(
                    format!("sub-{address}"),
                    format!("http://{address}"),
                    SubscriptionKind::Topic,
                    "t1",
                )
            })
            .collect();
        NotificationBatch::new(
            "{\"n\":1}".to_string(),
            consumers,
            BatchMetadata {
                track_id: 1,
                message_id: 1,
                dialect: Dialect::Eventing,
                producer: None,
                topic: Some("t1".to_string()),
            },
        )
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 2s");
    }

    async fn failure_isolation_case(mode: DeliveryMode) {
        let queue = Arc::new(TrackingQueue::new());
        let sender = Arc::new(RecordingSender::new(&["c1"]));
        queue.enqueue(batch_for(&["c1", "c2"])).await.unwrap();

        let service = DeliveryService::spawn(queue.clone(), sender.clone(), mode);

        wait_until(|| queue.processed() == vec![1]).await;
        wait_until(|| sender.attempts().len() == 2).await;
        service.shutdown().await;

        // C1 failed, C2 still attempted, batch marked processed regardless
        let attempts = sender.attempts();
        assert!(attempts.contains(&"http://c1".to_string()));
        assert!(attempts.contains(&"http://c2".to_string()));
        assert_eq!(queue.processed(), vec![1]);
    }

    #[tokio::test]
    async fn test_serial_isolates_consumer_failures() {
        failure_isolation_case(DeliveryMode::Serial).await;
    }

    #[tokio::test]
    async fn test_fixed_parallel_isolates_consumer_failures() {
        failure_isolation_case(DeliveryMode::FixedParallel { workers: 2 }).await;
    }

    #[tokio::test]
    async fn test_parallel_isolates_consumer_failures() {
        failure_isolation_case(DeliveryMode::Parallel).await;
    }

    #[tokio::test]
    async fn test_serial_preserves_batch_order() {
        let queue = Arc::new(TrackingQueue::new());
        let sender = Arc::new(RecordingSender::new(&[]));
        queue.enqueue(batch_for(&["a"])).await.unwrap();
        queue.enqueue(batch_for(&["b"])).await.unwrap();
        queue.enqueue(batch_for(&["c"])).await.unwrap();

        let service = DeliveryService::spawn(queue.clone(), sender.clone(), DeliveryMode::Serial);
        wait_until(|| queue.processed().len() == 3).await;
        service.shutdown().await;

        assert_eq!(sender.attempts(), vec!["http://a", "http://b", "http://c"]);
        assert_eq!(queue.processed(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fixed_parallel_delivers_all_consumers() {
        let queue = Arc::new(TrackingQueue::new());
        let sender = Arc::new(RecordingSender::new(&[]));
        queue
            .enqueue(batch_for(&["a", "b", "c", "d", "e"]))
            .await
            .unwrap();

        let service = DeliveryService::spawn(
            queue.clone(),
            sender.clone(),
            DeliveryMode::FixedParallel { workers: 2 },
        );
        wait_until(|| sender.attempts().len() == 5).await;
        service.shutdown().await;

        let attempts: HashSet<String> = sender.attempts().into_iter().collect();
        assert_eq!(attempts.len(), 5);
    }

    #[tokio::test]
    async fn test_shutdown_with_idle_queue_returns() {
        let queue = Arc::new(TrackingQueue::new());
        let sender = Arc::new(RecordingSender::new(&[]));
        let service = DeliveryService::spawn(queue, sender, DeliveryMode::Parallel);
        // Loop is parked in the empty-queue wait; shutdown must unblock it
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_never_strands_claimed_batches() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(
            DurableQueue::open(dir.path().join("queue.db"))
                .await
                .unwrap(),
        );
        let sender = Arc::new(RecordingSender::new(&[]));
        for name in ["a", "b", "c", "d", "e"] {
            queue.enqueue(batch_for(&[name])).await.unwrap();
        }

        let service = DeliveryService::spawn(queue.clone(), sender.clone(), DeliveryMode::Serial);
        service.shutdown().await;

        // However the shutdown interleaves with the loop, every batch the
        // store handed out was delivered and deleted; the rest are still
        // claimable in order, with no gap in between.
        let delivered = sender.attempts().len();
        assert_eq!(queue.size().await.unwrap(), 5 - delivered);
        match queue.try_dequeue().await.unwrap() {
            Some(entry) => assert_eq!(entry.sequence as usize, delivered + 1),
            None => assert_eq!(delivered, 5),
        }
    }

    /// Queue double that always reports empty and records when it was polled
    struct IdleQueue {
        polls: Mutex<Vec<tokio::time::Instant>>,
    }

    #[async_trait]
    impl DeliveryQueue for IdleQueue {
        async fn enqueue(&self, _batch: NotificationBatch) -> QueueResult<u64> {
            Ok(0)
        }
        async fn try_dequeue(&self) -> QueueResult<Option<QueuedBatch>> {
            self.polls.lock().unwrap().push(tokio::time::Instant::now());
            Ok(None)
        }
        async fn blocking_dequeue(&self) -> QueueResult<QueuedBatch> {
            loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
        async fn mark_processed(&self, _sequence: u64) -> QueueResult<()> {
            Ok(())
        }
        async fn size(&self) -> QueueResult<usize> {
            Ok(0)
        }
        async fn cleanup(&self) -> QueueResult<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_polling_backs_off_to_cap() {
        let queue = Arc::new(IdleQueue {
            polls: Mutex::new(Vec::new()),
        });
        let sender = Arc::new(RecordingSender::new(&[]));
        let service = DeliveryService::spawn(queue.clone(), sender, DeliveryMode::Serial);

        // Sleeps auto-advance under the paused clock; the gap between empty
        // polls grows by one step each time and saturates at 5s.
        tokio::time::sleep(Duration::from_secs(26)).await;
        service.shutdown().await;

        let polls = queue.polls.lock().unwrap().clone();
        let gaps: Vec<u64> = polls
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_secs())
            .collect();
        assert!(gaps.len() >= 6, "expected at least 6 polls, got {gaps:?}");
        assert_eq!(&gaps[..6], &[1, 2, 3, 4, 5, 5]);
    }
}
