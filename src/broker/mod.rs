//! Broker Lifecycle
//!
//! Assembles the subscription registry, matchers, processor, queue backend
//! and delivery service from one `BrokerConfig`, and tears them down again
//! in the reverse order. The broker owns nothing the caller needs after
//! `shutdown`; every component behind an `Arc` accessor stays usable by
//! handles the caller already cloned.

mod error;

pub use error::{BrokerError, BrokerResult};

use crate::core::config::{BrokerConfig, StorageKind};
use crate::delivery::{DeliverySender, DeliveryService, HttpSender};
use crate::matching::default_matchers;
use crate::processor::NotificationProcessor;
use crate::queue::{DeliveryQueue, DurableQueue, MemoryQueue};
use crate::subscription::SubscriptionRegistry;
use std::sync::Arc;

pub struct Broker {
    registry: Arc<SubscriptionRegistry>,
    processor: Arc<NotificationProcessor>,
    queue: Arc<dyn DeliveryQueue>,
    delivery: DeliveryService,
}

impl Broker {
    /// Build every component from the configuration and start delivering
    pub async fn start(config: &BrokerConfig) -> BrokerResult<Self> {
        let sender = Arc::new(HttpSender::new()?);
        Self::start_with_sender(config, sender).await
    }

    /// Same as `start` but with a caller-supplied sender; lets tests run
    /// the full pipeline without a network
    pub(crate) async fn start_with_sender(
        config: &BrokerConfig,
        sender: Arc<dyn DeliverySender>,
    ) -> BrokerResult<Self> {
        let queue = Self::open_queue(config).await?;

        if config.storage.purge_on_start {
            let dropped = queue.size().await?;
            queue.cleanup().await?;
            log::info!("Purged {dropped} pending batch(es) on startup");
        }

        let registry = Arc::new(SubscriptionRegistry::new());
        let processor = Arc::new(
            NotificationProcessor::new(registry.clone(), default_matchers(), queue.clone())
                .with_default_topic(config.broker.default_topic.clone()),
        );

        let delivery = DeliveryService::spawn(queue.clone(), sender, config.delivery_mode());
        log::info!(
            "Broker started ({} storage, pending batches: {})",
            config.storage.backend,
            queue.size().await?
        );

        Ok(Self {
            registry,
            processor,
            queue,
            delivery,
        })
    }

    async fn open_queue(config: &BrokerConfig) -> BrokerResult<Arc<dyn DeliveryQueue>> {
        match config.storage.backend {
            StorageKind::Memory => Ok(Arc::new(MemoryQueue::new())),
            StorageKind::Sqlite => {
                let path = config
                    .storage
                    .path
                    .clone()
                    .ok_or_else(|| BrokerError::Config {
                        message: "storage.path is required for the sqlite backend".to_string(),
                    })?;
                Ok(Arc::new(DurableQueue::open(path).await?))
            }
        }
    }

    pub fn registry(&self) -> Arc<SubscriptionRegistry> {
        self.registry.clone()
    }

    pub fn processor(&self) -> Arc<NotificationProcessor> {
        self.processor.clone()
    }

    pub fn queue(&self) -> Arc<dyn DeliveryQueue> {
        self.queue.clone()
    }

    /// Stop accepting dequeues and drain in-flight deliveries
    pub async fn shutdown(self) {
        self.delivery.shutdown().await;
        log::info!("Broker stopped");
    }
}
