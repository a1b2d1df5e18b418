//! Subscription and consumer list types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Notification dialect spoken by a consumer endpoint
///
/// The broker supports two notification dialects; the one recorded here
/// controls the shape of the outbound delivery call for this consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumerDialect {
    /// Batched triple-style notifications (dialect A)
    Notification,
    /// Single topic/message events (dialect B)
    Eventing,
}

/// How a subscription's token is interpreted during matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionKind {
    /// Token is a literal topic name, matched by equality
    Topic,
    /// Token is a serialized filter expression evaluated against the payload
    Filter,
}

/// A live consumer registration
///
/// Each subscription id maps to exactly one token at a time; resubscribing
/// under a new token is remove-then-add at the registry level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Opaque unique subscription id
    pub id: String,
    /// Consumer callback address (URI-like)
    pub consumer_address: String,
    /// Dialect used for outbound deliveries to this consumer
    pub dialect: ConsumerDialect,
    /// Whether the consumer asked for wrapped notify-style delivery
    pub use_notify: bool,
    /// Paused subscriptions are excluded from future matches only;
    /// batches already enqueued still carry them
    pub paused: bool,
    /// Never-expires vs. time-bounded (expiry is driven externally)
    pub never_expires: bool,
    /// Reliable-delivery policy flag carried through from the subscribe request
    pub reliable: bool,
    /// Token interpretation for the matchers
    pub kind: SubscriptionKind,
    /// The token this subscription is indexed under
    pub token: String,
}

impl Subscription {
    /// Create a subscription with default policy flags
    pub fn new(
        id: impl Into<String>,
        consumer_address: impl Into<String>,
        kind: SubscriptionKind,
        token: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            consumer_address: consumer_address.into(),
            dialect: ConsumerDialect::Notification,
            use_notify: false,
            paused: false,
            never_expires: false,
            reliable: false,
            kind,
            token: token.into(),
        }
    }

    pub fn with_dialect(mut self, dialect: ConsumerDialect) -> Self {
        self.dialect = dialect;
        self
    }
}

/// Consumers registered under a single token
///
/// Owned by exactly one registry entry. Created lazily on the first
/// subscription for a token and left in place (possibly empty) until the
/// registry prunes it.
#[derive(Debug, Clone, Default)]
pub struct ConsumerList {
    subscriptions: HashMap<String, Subscription>,
}

impl ConsumerList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the subscription stored under its id
    pub fn insert(&mut self, subscription: Subscription) -> Option<Subscription> {
        self.subscriptions
            .insert(subscription.id.clone(), subscription)
    }

    pub fn remove(&mut self, subscription_id: &str) -> Option<Subscription> {
        self.subscriptions.remove(subscription_id)
    }

    pub fn get(&self, subscription_id: &str) -> Option<&Subscription> {
        self.subscriptions.get(subscription_id)
    }

    pub fn get_mut(&mut self, subscription_id: &str) -> Option<&mut Subscription> {
        self.subscriptions.get_mut(subscription_id)
    }

    pub fn contains(&self, subscription_id: &str) -> bool {
        self.subscriptions.contains_key(subscription_id)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Iterate all subscriptions in the list
    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.values()
    }

    /// Iterate subscriptions eligible for matching (paused ones excluded)
    pub fn active(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.values().filter(|s| !s.paused)
    }
}
