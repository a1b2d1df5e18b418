//! Exact-topic matcher

use crate::matching::MessageMatcher;
use crate::subscription::{Subscription, SubscriptionKind, SubscriptionRegistry};
use serde_json::Value;

/// Matches subscriptions registered under the literal topic token
pub struct TopicMatcher;

impl MessageMatcher for TopicMatcher {
    fn name(&self) -> &'static str {
        "topic"
    }

    fn populate_matches(
        &self,
        registry: &SubscriptionRegistry,
        token: &str,
        _payload: &Value,
        matches: &mut Vec<Subscription>,
    ) {
        let Some(list) = registry.lookup(token) else {
            return;
        };
        for subscription in list.active() {
            if subscription.kind == SubscriptionKind::Topic {
                matches.push(subscription.clone());
            }
        }
    }
}
