//! Queue Error Types

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Batch encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Queue counters not initialised, store needs to be recreated")]
    CountersMissing,

    #[error("Queue row {sequence} missing: marks are inconsistent with the queue table")]
    RowMissing { sequence: u64 },
}

impl From<tokio_rusqlite::Error> for QueueError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        QueueError::Storage {
            message: err.to_string(),
        }
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
