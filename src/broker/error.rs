//! Broker lifecycle errors

use crate::delivery::DeliveryError;
use crate::queue::QueueError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Queue backend error: {0}")]
    Queue(#[from] QueueError),

    #[error("Delivery setup error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Broker configuration error: {message}")]
    Config { message: String },
}

pub type BrokerResult<T> = Result<T, BrokerError>;
