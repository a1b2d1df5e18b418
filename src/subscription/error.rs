//! Subscription Error Types

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Subscription not found: {id}")]
    NotFound { id: String },
}

/// Result type for subscription operations
pub type SubscriptionResult<T> = Result<T, SubscriptionError>;
