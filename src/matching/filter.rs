//! Filter-expression matcher
//!
//! Filter subscriptions are registered under a serialized expression rather
//! than a topic name. An expression selects a dotted path inside the JSON
//! payload and tests it:
//!
//! ```text
//! event.status = 'FAILED'
//! run.attempt != 3
//! event.error exists
//! ```
//!
//! String literals are single-quoted; bare values are parsed as numbers or
//! booleans. A malformed expression disables only its own registry entry:
//! it is logged and skipped, never aborting the sibling entries or the
//! other matchers.

use crate::matching::MessageMatcher;
use crate::subscription::{Subscription, SubscriptionKind, SubscriptionRegistry};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
#[error("Malformed filter expression '{expression}': {reason}")]
pub struct FilterParseError {
    pub expression: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Comparison {
    Eq(Value),
    Ne(Value),
    Exists,
}

/// A parsed filter expression: path plus comparison
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression {
    path: Vec<String>,
    comparison: Comparison,
}

impl FilterExpression {
    pub fn parse(input: &str) -> Result<Self, FilterParseError> {
        let err = |reason: &str| FilterParseError {
            expression: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(err("empty expression"));
        }

        let (path_part, comparison) = if let Some(path) = trimmed.strip_suffix("exists") {
            if path.trim().is_empty() {
                return Err(err("missing path before 'exists'"));
            }
            (path.trim(), Comparison::Exists)
        } else if let Some((path, literal)) = trimmed.split_once("!=") {
            (path.trim(), Comparison::Ne(parse_literal(literal.trim(), &err)?))
        } else if let Some((path, literal)) = trimmed.split_once('=') {
            (path.trim(), Comparison::Eq(parse_literal(literal.trim(), &err)?))
        } else {
            return Err(err("expected '=', '!=' or 'exists'"));
        };

        if path_part.contains('=') || path_part.contains(char::is_whitespace) {
            return Err(err("invalid path"));
        }
        let path: Vec<String> = path_part.split('.').map(str::to_string).collect();
        if path.iter().any(|segment| segment.is_empty()) {
            return Err(err("empty path segment"));
        }

        Ok(Self { path, comparison })
    }

    /// Evaluate the expression against a message payload
    pub fn matches(&self, payload: &Value) -> bool {
        let node = self
            .path
            .iter()
            .try_fold(payload, |node, segment| node.get(segment));

        match (&self.comparison, node) {
            (Comparison::Exists, node) => node.is_some(),
            (Comparison::Eq(expected), Some(actual)) => actual == expected,
            (Comparison::Ne(expected), Some(actual)) => actual != expected,
            // An absent path matches neither equality nor inequality
            (_, None) => false,
        }
    }
}

fn parse_literal(
    literal: &str,
    err: &impl Fn(&str) -> FilterParseError,
) -> Result<Value, FilterParseError> {
    if literal.is_empty() {
        return Err(err("missing comparison value"));
    }
    if let Some(quoted) = literal.strip_prefix('\'') {
        let Some(inner) = quoted.strip_suffix('\'') else {
            return Err(err("unterminated string literal"));
        };
        return Ok(Value::String(inner.to_string()));
    }
    match literal {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if let Ok(number) = literal.parse::<i64>() {
        return Ok(Value::from(number));
    }
    if let Ok(number) = literal.parse::<f64>() {
        return Ok(Value::from(number));
    }
    Err(err("unrecognised literal, string values must be quoted"))
}

/// Matches filter-style subscriptions by evaluating each registered
/// expression against the message payload
pub struct FilterMatcher;

impl MessageMatcher for FilterMatcher {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn populate_matches(
        &self,
        registry: &SubscriptionRegistry,
        _token: &str,
        payload: &Value,
        matches: &mut Vec<Subscription>,
    ) {
        for token in registry.filter_tokens() {
            let expression = match FilterExpression::parse(&token) {
                Ok(expression) => expression,
                Err(parse_err) => {
                    log::warn!("Skipping filter subscription entry: {parse_err}");
                    continue;
                }
            };
            if !expression.matches(payload) {
                continue;
            }
            let Some(list) = registry.lookup(&token) else {
                continue;
            };
            for subscription in list.active() {
                if subscription.kind == SubscriptionKind::Filter {
                    matches.push(subscription.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter_sub(id: &str, token: &str) -> Subscription {
        Subscription::new(
            id,
            format!("http://consumer/{id}"),
            SubscriptionKind::Filter,
            token,
        )
    }

    #[test]
    fn test_parse_equality() {
        let expr = FilterExpression::parse("event.status = 'FAILED'").unwrap();
        assert!(expr.matches(&json!({"event": {"status": "FAILED"}})));
        assert!(!expr.matches(&json!({"event": {"status": "DONE"}})));
        assert!(!expr.matches(&json!({"other": 1})));
    }

    #[test]
    fn test_parse_inequality_and_numbers() {
        let expr = FilterExpression::parse("run.attempt != 3").unwrap();
        assert!(expr.matches(&json!({"run": {"attempt": 2}})));
        assert!(!expr.matches(&json!({"run": {"attempt": 3}})));
        // Absent path matches neither comparison
        assert!(!expr.matches(&json!({})));
    }

    #[test]
    fn test_parse_exists() {
        let expr = FilterExpression::parse("event.error exists").unwrap();
        assert!(expr.matches(&json!({"event": {"error": null}})));
        assert!(!expr.matches(&json!({"event": {}})));
    }

    #[test]
    fn test_parse_booleans() {
        let expr = FilterExpression::parse("done = true").unwrap();
        assert!(expr.matches(&json!({"done": true})));
        assert!(!expr.matches(&json!({"done": false})));
    }

    #[test]
    fn test_malformed_expressions() {
        assert!(FilterExpression::parse("").is_err());
        assert!(FilterExpression::parse("status").is_err());
        assert!(FilterExpression::parse("status = ").is_err());
        assert!(FilterExpression::parse("status = unquoted").is_err());
        assert!(FilterExpression::parse("status = 'open").is_err());
        assert!(FilterExpression::parse(". = 'x'").is_err());
    }

    #[test]
    fn test_matcher_appends_matching_subscriptions() {
        let registry = SubscriptionRegistry::new();
        let token = "event.status = 'FAILED'";
        registry.add_subscription(token, "f1", filter_sub("f1", token));

        let mut matches = Vec::new();
        FilterMatcher.populate_matches(
            &registry,
            "ignored-topic",
            &json!({"event": {"status": "FAILED"}}),
            &mut matches,
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "f1");

        matches.clear();
        FilterMatcher.populate_matches(
            &registry,
            "ignored-topic",
            &json!({"event": {"status": "OK"}}),
            &mut matches,
        );
        assert!(matches.is_empty());
    }

    #[test]
    fn test_malformed_entry_does_not_block_siblings() {
        let registry = SubscriptionRegistry::new();
        let bad = "not a filter";
        let good = "kind = 'alert'";
        registry.add_subscription(bad, "f1", filter_sub("f1", bad));
        registry.add_subscription(good, "f2", filter_sub("f2", good));

        let mut matches = Vec::new();
        FilterMatcher.populate_matches(
            &registry,
            "ignored-topic",
            &json!({"kind": "alert"}),
            &mut matches,
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "f2");
    }
}
