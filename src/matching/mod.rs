//! Message matching
//!
//! Pluggable predicate evaluators that decide which consumers receive an
//! inbound message. The processor drives an explicit ordered list of
//! matcher instances, built once at startup; each matcher independently
//! appends into the shared result list (no dedup — the configured matchers
//! cover disjoint subscription styles). A matcher that finds nothing
//! appends nothing; matcher-local failures are logged and never abort
//! sibling matchers.

mod filter;
mod topic;

pub use filter::{FilterExpression, FilterMatcher, FilterParseError};
pub use topic::TopicMatcher;

use crate::subscription::{Subscription, SubscriptionRegistry};
use serde_json::Value;

/// Predicate evaluator mapping an inbound message to matched consumers
pub trait MessageMatcher: Send + Sync {
    /// Matcher name used in logs
    fn name(&self) -> &'static str;

    /// Append every subscription this matcher considers a recipient of the
    /// message to `matches`. Paused subscriptions are excluded.
    fn populate_matches(
        &self,
        registry: &SubscriptionRegistry,
        token: &str,
        payload: &Value,
        matches: &mut Vec<Subscription>,
    );
}

/// The standard matcher list: exact-topic first, then filter expressions
pub fn default_matchers() -> Vec<Box<dyn MessageMatcher>> {
    vec![Box::new(TopicMatcher), Box::new(FilterMatcher)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matchers_order_and_names() {
        let matchers = default_matchers();
        let names: Vec<&str> = matchers.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["topic", "filter"]);
    }
}
