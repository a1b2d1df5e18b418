//! Herald notification broker
//!
//! A topic and filter based pub/sub broker: publishers post notification
//! envelopes in one of two wire dialects, the processor matches them against
//! registered subscriptions, matched batches flow through a durable delivery
//! queue to their consumers over HTTP.

pub mod app;
pub mod broker;
pub mod core;
pub mod delivery;
pub mod matching;
pub mod processor;
pub mod queue;
pub mod subscription;
