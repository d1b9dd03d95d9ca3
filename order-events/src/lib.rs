//! Order Events - Durable Subscription Abstraction
//!
//! The ingestion consumer only needs three things from a transport: receive
//! the next message, acknowledge it, and negatively acknowledge it. This crate
//! defines that contract and ships two bindings.
//!
//! ```text
//! publisher ──publish──▶ channel ──next()──▶ consumer
//!                           ▲                   │
//!                           └──── ack / nak ────┘
//! ```
//!
//! # Traits
//!
//! - `Subscription`: pull the next delivery of a durable subscription
//! - `Delivery`: one received message with its payload and ack handles
//! - `Publisher`: append a payload to the channel subject
//!
//! # Bindings
//!
//! - `InMemoryChannel`: process-local channel with durable semantics
//! - `NatsChannel`: NATS JetStream stream with a durable pull consumer

mod channel;
mod in_memory;
mod nats;

pub use channel::{Delivery, Publisher, Subscription};
pub use in_memory::{InMemoryChannel, InMemoryDelivery, InMemorySubscription};
pub use nats::{NatsChannel, NatsConfig, NatsDelivery, NatsSubscription};

pub use order_core::ChannelError;
