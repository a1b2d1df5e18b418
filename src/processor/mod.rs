//! Notification Processor
//!
//! The orchestration point between the inbound boundary and the delivery
//! queue: normalize an envelope into `(topic, payload, metadata)` tuples,
//! drive the configured matchers against the subscription registry, and
//! enqueue a batch per tuple that matched anybody. Enqueue is synchronous
//! from the publisher's point of view — the acknowledgement is returned
//! only after every matched tuple is durably recorded.

mod envelope;
mod error;

pub use envelope::{
    Acknowledgement, Dialect, InboundEnvelope, ResolvedNotification, EVENTING_NAMESPACE,
    NOTIFICATION_NAMESPACE,
};
pub use error::{ProcessorError, ProcessorResult};

use crate::matching::MessageMatcher;
use crate::queue::{BatchMetadata, DeliveryQueue, NotificationBatch};
use crate::subscription::SubscriptionRegistry;
use std::sync::Arc;
use std::sync::Mutex;

/// Fallback topic token substituted for dialect-B events without a topic
pub const DEFAULT_TOPIC: &str = "herald.default";

/// Both processor counters live behind one lock so neither can ever skip
/// or duplicate a value within a process lifetime.
struct Counters {
    next_track_id: u64,
    next_message_id: u64,
}

pub struct NotificationProcessor {
    registry: Arc<SubscriptionRegistry>,
    matchers: Vec<Box<dyn MessageMatcher>>,
    queue: Arc<dyn DeliveryQueue>,
    default_topic: String,
    counters: Mutex<Counters>,
}

impl NotificationProcessor {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        matchers: Vec<Box<dyn MessageMatcher>>,
        queue: Arc<dyn DeliveryQueue>,
    ) -> Self {
        Self {
            registry,
            matchers,
            queue,
            default_topic: DEFAULT_TOPIC.to_string(),
            counters: Mutex::new(Counters {
                next_track_id: 1,
                next_message_id: 1,
            }),
        }
    }

    pub fn with_default_topic(mut self, default_topic: impl Into<String>) -> Self {
        self.default_topic = default_topic.into();
        self
    }

    /// Accept one inbound envelope and return the same-dialect ack
    ///
    /// The ack means "accepted for processing", independent of whether
    /// anything matched. Tuples with an empty match set are dropped without
    /// a queue entry; a failure to durably record a matched tuple fails the
    /// whole call back to the publisher.
    pub async fn accept(&self, envelope: InboundEnvelope) -> ProcessorResult<Acknowledgement> {
        let dialect = Dialect::from_namespace(&envelope.namespace).ok_or_else(|| {
            ProcessorError::UnknownDialect {
                namespace: envelope.namespace.clone(),
            }
        })?;

        let resolved = match dialect {
            Dialect::Notification => envelope::resolve_notification_body(&envelope.body)?,
            Dialect::Eventing => {
                vec![envelope::resolve_eventing_body(
                    &envelope.body,
                    &self.default_topic,
                )?]
            }
        };

        let track_id = self.next_track_id();
        log::debug!(
            "Accepted {:?} envelope with {} notification(s), track id {}",
            dialect,
            resolved.len(),
            track_id
        );

        for notification in resolved {
            self.process_notification(dialect, track_id, notification)
                .await?;
        }

        Ok(Acknowledgement { dialect, track_id })
    }

    async fn process_notification(
        &self,
        dialect: Dialect,
        track_id: u64,
        notification: ResolvedNotification,
    ) -> ProcessorResult<()> {
        let mut matches = Vec::new();
        for matcher in &self.matchers {
            let before = matches.len();
            matcher.populate_matches(
                &self.registry,
                &notification.topic,
                &notification.message,
                &mut matches,
            );
            log::trace!(
                "Matcher '{}' matched {} consumer(s) for topic '{}'",
                matcher.name(),
                matches.len() - before,
                notification.topic
            );
        }

        if matches.is_empty() {
            // Dropping unmatched messages keeps the queue from growing
            // without bound for topics nobody subscribed to.
            log::debug!(
                "No subscribers for topic '{}', dropping message (track id {})",
                notification.topic,
                track_id
            );
            return Ok(());
        }

        let message_id = self.next_message_id();
        let payload = notification.message.to_string();
        let batch = NotificationBatch::new(
            payload,
            matches,
            BatchMetadata {
                track_id,
                message_id,
                dialect,
                producer: notification.producer,
                topic: Some(notification.topic.clone()),
            },
        );

        let consumer_count = batch.consumers.len();
        let sequence = self.queue.enqueue(batch).await?;
        log::info!(
            "Enqueued batch {} for topic '{}' with {} consumer(s) (track id {})",
            sequence,
            notification.topic,
            consumer_count,
            track_id
        );
        Ok(())
    }

    fn next_track_id(&self) -> u64 {
        let mut counters = self.counters.lock().unwrap();
        let track_id = counters.next_track_id;
        counters.next_track_id += 1;
        track_id
    }

    fn next_message_id(&self) -> u64 {
        let mut counters = self.counters.lock().unwrap();
        let message_id = counters.next_message_id;
        counters.next_message_id += 1;
        message_id
    }
}
