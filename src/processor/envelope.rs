//! Inbound envelope dialects
//!
//! The boundary web-service layer owns the wire encoding; what reaches the
//! processor is a decoded envelope: the namespace that names the dialect
//! plus the JSON body. Dialect A (batched notifications) wraps zero or more
//! `(topic, producer, message)` triples in one envelope; dialect B
//! (eventing) carries a single topic/message pair, with a fallback topic
//! when none is given.

use crate::processor::error::{ProcessorError, ProcessorResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Namespace identifying the batched-notification dialect (A)
pub const NOTIFICATION_NAMESPACE: &str =
    "http://www.ibm.com/xmlns/stdwip/web-services/WS-BaseNotification";
/// Namespace identifying the eventing dialect (B)
pub const EVENTING_NAMESPACE: &str = "http://schemas.xmlsoap.org/ws/2004/08/eventing";

/// The two supported notification dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialect {
    /// Dialect A: an envelope of notification triples
    Notification,
    /// Dialect B: a single topic/message event
    Eventing,
}

impl Dialect {
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            NOTIFICATION_NAMESPACE => Some(Self::Notification),
            EVENTING_NAMESPACE => Some(Self::Eventing),
            _ => None,
        }
    }

    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Notification => NOTIFICATION_NAMESPACE,
            Self::Eventing => EVENTING_NAMESPACE,
        }
    }
}

/// A decoded inbound message as handed over by the boundary layer
#[derive(Debug, Clone)]
pub struct InboundEnvelope {
    /// Namespace of the envelope, names the dialect
    pub namespace: String,
    /// Decoded message body
    pub body: Value,
}

impl InboundEnvelope {
    /// Build a dialect-A envelope from `(topic, producer, message)` triples
    pub fn notification(triples: Vec<Value>) -> Self {
        Self {
            namespace: NOTIFICATION_NAMESPACE.to_string(),
            body: json!({ "notifications": triples }),
        }
    }

    /// Build a dialect-B envelope
    pub fn eventing(topic: Option<&str>, message: Value) -> Self {
        let mut body = json!({ "message": message });
        if let Some(topic) = topic {
            body["topic"] = Value::String(topic.to_string());
        }
        Self {
            namespace: EVENTING_NAMESPACE.to_string(),
            body,
        }
    }
}

/// One `(topic, payload, metadata)` tuple resolved from an envelope
#[derive(Debug, Clone)]
pub struct ResolvedNotification {
    pub topic: String,
    pub producer: Option<String>,
    pub message: Value,
}

/// Resolve a dialect-A body into independent notifications
///
/// An envelope with zero triples fails the whole request; a malformed
/// triple is a local error — logged, skipped, and the remaining triples in
/// the same envelope still go through.
pub fn resolve_notification_body(body: &Value) -> ProcessorResult<Vec<ResolvedNotification>> {
    let triples = body
        .get("notifications")
        .and_then(Value::as_array)
        .ok_or(ProcessorError::MissingMessage)?;
    if triples.is_empty() {
        return Err(ProcessorError::EmptyEnvelope);
    }

    let mut resolved = Vec::with_capacity(triples.len());
    for (index, triple) in triples.iter().enumerate() {
        let topic = triple.get("topic").and_then(Value::as_str);
        let message = triple.get("message");
        match (topic, message) {
            (Some(topic), Some(message)) if !message.is_null() => {
                resolved.push(ResolvedNotification {
                    topic: topic.to_string(),
                    producer: triple
                        .get("producer")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    message: message.clone(),
                });
            }
            _ => {
                log::error!(
                    "Skipping malformed notification element {index}: missing topic or message"
                );
            }
        }
    }
    Ok(resolved)
}

/// Resolve a dialect-B body into its single notification
///
/// A missing message element is a fault; a missing topic is not — the
/// configured default topic token is substituted.
pub fn resolve_eventing_body(
    body: &Value,
    default_topic: &str,
) -> ProcessorResult<ResolvedNotification> {
    let message = body
        .get("message")
        .filter(|message| !message.is_null())
        .ok_or(ProcessorError::MissingMessage)?;
    let topic = match body.get("topic").and_then(Value::as_str) {
        Some(topic) => topic.to_string(),
        None => {
            log::debug!("Event carries no topic, substituting '{default_topic}'");
            default_topic.to_string()
        }
    };
    Ok(ResolvedNotification {
        topic,
        producer: None,
        message: message.clone(),
    })
}

/// Same-dialect acknowledgement returned to the publisher
///
/// Means "accepted for processing", not "delivered": it is returned whether
/// or not the message matched any subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
    pub dialect: Dialect,
    pub track_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_namespace() {
        assert_eq!(
            Dialect::from_namespace(NOTIFICATION_NAMESPACE),
            Some(Dialect::Notification)
        );
        assert_eq!(
            Dialect::from_namespace(EVENTING_NAMESPACE),
            Some(Dialect::Eventing)
        );
        assert_eq!(Dialect::from_namespace("urn:unknown"), None);
    }

    #[test]
    fn test_notification_body_with_zero_triples_is_rejected() {
        let envelope = InboundEnvelope::notification(vec![]);
        match resolve_notification_body(&envelope.body) {
            Err(ProcessorError::EmptyEnvelope) => {}
            other => panic!("expected EmptyEnvelope, got {other:?}"),
        }
    }

    #[test]
    fn test_notification_body_without_array_is_a_fault() {
        match resolve_notification_body(&json!({})) {
            Err(ProcessorError::MissingMessage) => {}
            other => panic!("expected MissingMessage, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_triple_is_skipped_locally() {
        let envelope = InboundEnvelope::notification(vec![
            json!({"topic": "t1", "message": {"n": 1}}),
            json!({"topic": "t2"}),
            json!({"topic": "t3", "producer": "p", "message": {"n": 3}}),
        ]);
        let resolved = resolve_notification_body(&envelope.body).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].topic, "t1");
        assert_eq!(resolved[1].topic, "t3");
        assert_eq!(resolved[1].producer.as_deref(), Some("p"));
    }

    #[test]
    fn test_eventing_body_requires_message() {
        match resolve_eventing_body(&json!({"topic": "t1"}), "fallback") {
            Err(ProcessorError::MissingMessage) => {}
            other => panic!("expected MissingMessage, got {other:?}"),
        }
    }

    #[test]
    fn test_eventing_body_substitutes_default_topic() {
        let resolved = resolve_eventing_body(&json!({"message": {"n": 1}}), "fallback").unwrap();
        assert_eq!(resolved.topic, "fallback");

        let resolved =
            resolve_eventing_body(&json!({"topic": "t1", "message": {"n": 1}}), "fallback")
                .unwrap();
        assert_eq!(resolved.topic, "t1");
    }
}
