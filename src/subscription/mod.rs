//! Subscription management for the broker
//!
//! A subscription binds a consumer endpoint to a token — either a literal
//! topic name or a serialized filter expression. The `SubscriptionRegistry`
//! is the live index the matchers consult on every inbound message, and the
//! subscribe/unsubscribe boundary mutates it concurrently with matching.

mod error;
mod registry;
mod types;

pub use error::{SubscriptionError, SubscriptionResult};
pub use registry::SubscriptionRegistry;
pub use types::{ConsumerDialect, ConsumerList, Subscription, SubscriptionKind};
