//! Processor Error Types

use crate::queue::QueueError;

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Envelope has no message element")]
    MissingMessage,

    #[error("At least one notification element is required")]
    EmptyEnvelope,

    #[error("Unsupported notification namespace: {namespace}")]
    UnknownDialect { namespace: String },

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Result type for processor operations
pub type ProcessorResult<T> = Result<T, ProcessorError>;
