//! Delivery Error Types

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Delivery to {address} failed: {source}")]
    Transport {
        address: String,
        source: reqwest::Error,
    },

    #[error("Consumer {address} rejected delivery with status {status}")]
    Rejected { address: String, status: u16 },

    #[error("Delivery failed: {message}")]
    Failed { message: String },
}

/// Result type for delivery attempts
pub type DeliveryResult<T> = Result<T, DeliveryError>;
