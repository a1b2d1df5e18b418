//! SubscriptionRegistry - the live subscription index
//!
//! Maps each token to the `ConsumerList` registered under it and keeps a
//! reverse id-to-token map so unsubscribe requests do not need to repeat the
//! token. All mutation goes through a single `RwLock`; readers take cheap
//! snapshots so matching never holds the lock across payload evaluation.

use crate::subscription::error::{SubscriptionError, SubscriptionResult};
use crate::subscription::types::{ConsumerList, Subscription, SubscriptionKind};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct RegistryState {
    /// token -> consumers registered under it
    consumers: HashMap<String, ConsumerList>,
    /// subscription id -> token reverse map
    token_by_id: HashMap<String, String>,
}

/// Shared subscription index
///
/// Thread-safe; subscribe/unsubscribe calls arrive from request-handling
/// tasks concurrently with matcher reads on every inbound message.
#[derive(Default)]
pub struct SubscriptionRegistry {
    state: RwLock<RegistryState>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a subscription under a token's consumer list
    ///
    /// The list is created lazily for the first subscription on a token.
    /// Re-adding the same id is idempotent; the subscription payload is
    /// replaced (last write wins) and the replacement is logged.
    pub fn add_subscription(&self, token: &str, subscription_id: &str, subscription: Subscription) {
        let mut state = self.state.write().unwrap();

        // A resubscribe under a different token must not leave the old
        // mapping behind.
        if let Some(previous_token) = state.token_by_id.get(subscription_id).cloned() {
            if previous_token != token {
                log::warn!(
                    "Subscription '{}' moved from token '{}' to '{}'",
                    subscription_id,
                    previous_token,
                    token
                );
                if let Some(list) = state.consumers.get_mut(&previous_token) {
                    list.remove(subscription_id);
                }
            }
        }

        let list = state.consumers.entry(token.to_string()).or_default();
        if list.insert(subscription).is_some() {
            log::debug!(
                "Subscription '{}' replaced under token '{}'",
                subscription_id,
                token
            );
        }
        state
            .token_by_id
            .insert(subscription_id.to_string(), token.to_string());
    }

    /// Remove a subscription, resolving its token when not supplied
    ///
    /// Returns how many subscriptions were removed (1, or 0 when the id was
    /// not found). Zero is not an error: a concurrent unsubscribe from
    /// elsewhere is an expected race and is only logged.
    pub fn remove_subscription(&self, subscription_id: &str, token: Option<&str>) -> usize {
        let mut state = self.state.write().unwrap();

        let token = match token {
            Some(t) => t.to_string(),
            None => match state.token_by_id.get(subscription_id) {
                Some(t) => t.clone(),
                None => {
                    log::info!(
                        "Unsubscribe for unknown subscription '{}' (already removed?)",
                        subscription_id
                    );
                    return 0;
                }
            },
        };

        let removed = match state.consumers.get_mut(&token) {
            Some(list) => {
                if list.remove(subscription_id).is_some() {
                    1
                } else {
                    0
                }
            }
            _ => 0,
        };
        // Reverse-map bookkeeping, not counted as a removed subscription
        state.token_by_id.remove(subscription_id);

        if removed == 0 {
            log::info!(
                "Unsubscribe for '{}' under token '{}' removed nothing",
                subscription_id,
                token
            );
        }
        removed
    }

    /// Snapshot the consumer list registered under a token
    pub fn lookup(&self, token: &str) -> Option<ConsumerList> {
        let state = self.state.read().unwrap();
        state.consumers.get(token).cloned()
    }

    /// Reverse lookup: the token a subscription id is registered under
    pub fn token_of(&self, subscription_id: &str) -> Option<String> {
        let state = self.state.read().unwrap();
        state.token_by_id.get(subscription_id).cloned()
    }

    /// Pause a subscription: excluded from future matches, already-enqueued
    /// batches are unaffected
    pub fn pause(&self, subscription_id: &str) -> SubscriptionResult<()> {
        self.set_paused(subscription_id, true)
    }

    /// Resume a paused subscription
    pub fn resume(&self, subscription_id: &str) -> SubscriptionResult<()> {
        self.set_paused(subscription_id, false)
    }

    fn set_paused(&self, subscription_id: &str, paused: bool) -> SubscriptionResult<()> {
        let mut state = self.state.write().unwrap();
        let token = state
            .token_by_id
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| SubscriptionError::NotFound {
                id: subscription_id.to_string(),
            })?;
        let sub = state
            .consumers
            .get_mut(&token)
            .and_then(|list| list.get_mut(subscription_id))
            .ok_or_else(|| SubscriptionError::NotFound {
                id: subscription_id.to_string(),
            })?;
        sub.paused = paused;
        Ok(())
    }

    /// Total number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        let state = self.state.read().unwrap();
        state.token_by_id.len()
    }

    /// Snapshot of the tokens carrying filter-style subscriptions
    ///
    /// Used by the filter matcher, which has to evaluate every registered
    /// expression against the payload rather than looking one token up.
    pub fn filter_tokens(&self) -> Vec<String> {
        let state = self.state.read().unwrap();
        state
            .consumers
            .iter()
            .filter(|(_, list)| list.iter().any(|s| s.kind == SubscriptionKind::Filter))
            .map(|(token, _)| token.clone())
            .collect()
    }
}
