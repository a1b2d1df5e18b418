//! Outbound delivery calls
//!
//! One HTTP request per (batch, consumer), carrying the payload and the
//! correlation metadata. Fire-and-forget from the broker's perspective:
//! the response only decides how the attempt is logged. Connect/read
//! timeouts belong to the transport layer, so the client sets them here
//! rather than in the strategies.

use crate::delivery::error::{DeliveryError, DeliveryResult};
use crate::queue::NotificationBatch;
use crate::subscription::Subscription;
use async_trait::async_trait;
use std::time::Duration;

/// Correlation header carrying the track id
pub const TRACK_ID_HEADER: &str = "X-Herald-Track-Id";
/// Correlation header carrying the producer reference, when present
pub const PRODUCER_HEADER: &str = "X-Herald-Producer";
/// Correlation header carrying the serialized topic, when present
pub const TOPIC_HEADER: &str = "X-Herald-Topic";

/// One outbound delivery attempt to one consumer
#[async_trait]
pub trait DeliverySender: Send + Sync {
    async fn deliver(
        &self,
        subscription: &Subscription,
        batch: &NotificationBatch,
    ) -> DeliveryResult<()>;
}

/// HTTP sender posting the payload to the consumer's registered address
pub struct HttpSender {
    client: reqwest::Client,
}

impl HttpSender {
    pub fn new() -> DeliveryResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| DeliveryError::Failed {
                message: format!("could not build HTTP client: {err}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DeliverySender for HttpSender {
    async fn deliver(
        &self,
        subscription: &Subscription,
        batch: &NotificationBatch,
    ) -> DeliveryResult<()> {
        let address = &subscription.consumer_address;
        let mut request = self
            .client
            .post(address)
            .header("Content-Type", "application/json")
            .header(TRACK_ID_HEADER, batch.metadata.track_id.to_string());
        if let Some(producer) = &batch.metadata.producer {
            request = request.header(PRODUCER_HEADER, producer);
        }
        if let Some(topic) = &batch.metadata.topic {
            request = request.header(TOPIC_HEADER, topic);
        }

        let response = request
            .body(batch.payload.clone())
            .send()
            .await
            .map_err(|source| DeliveryError::Transport {
                address: address.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Rejected {
                address: address.clone(),
                status: response.status().as_u16(),
            })
        }
    }
}
