//! NATS JetStream binding.
//!
//! The stream is created on connect if it does not exist yet. Subscriptions
//! use a durable pull consumer with explicit acknowledgment, so a restarted
//! process resumes from the first unacknowledged message.

use crate::{Delivery, Publisher, Subscription};
use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy, DeliverPolicy},
    AckKind,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use order_core::ChannelError;
use tracing::{debug, info};

/// Connection settings for the JetStream channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatsConfig {
    pub url: String,
    pub stream: String,
    pub subject: String,
    pub durable: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            stream: "ORDERS".to_string(),
            subject: "orders".to_string(),
            durable: "order-durable".to_string(),
        }
    }
}

/// Connected JetStream channel.
#[derive(Clone)]
pub struct NatsChannel {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    config: NatsConfig,
}

impl NatsChannel {
    /// Connect to the server and ensure the stream exists.
    pub async fn connect(config: NatsConfig) -> Result<Self, ChannelError> {
        let client = async_nats::connect(config.url.as_str())
            .await
            .map_err(|e| ChannelError::ConnectFailed {
                url: config.url.clone(),
                reason: e.to_string(),
            })?;
        let jetstream = jetstream::new(client.clone());

        jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream.clone(),
                subjects: vec![config.subject.clone()],
                ..Default::default()
            })
            .await
            .map_err(|e| ChannelError::ConnectFailed {
                url: config.url.clone(),
                reason: format!("stream {}: {}", config.stream, e),
            })?;

        info!(
            url = %config.url,
            stream = %config.stream,
            subject = %config.subject,
            "connected to JetStream"
        );

        Ok(Self {
            client,
            jetstream,
            config,
        })
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }

    /// Open the configured durable subscription.
    ///
    /// A durable seen for the first time starts at the last message already
    /// in the stream; an existing durable resumes where it left off.
    pub async fn subscribe(&self) -> Result<NatsSubscription, ChannelError> {
        let durable = self.config.durable.clone();
        let subscribe_err = |reason: String| ChannelError::SubscribeFailed {
            durable: durable.clone(),
            reason,
        };

        let stream = self
            .jetstream
            .get_stream(&self.config.stream)
            .await
            .map_err(|e| subscribe_err(e.to_string()))?;

        let consumer = stream
            .get_or_create_consumer(
                &durable,
                pull::Config {
                    durable_name: Some(durable.clone()),
                    filter_subject: self.config.subject.clone(),
                    ack_policy: AckPolicy::Explicit,
                    deliver_policy: DeliverPolicy::Last,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| subscribe_err(e.to_string()))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| subscribe_err(e.to_string()))?;

        info!(durable = %durable, subject = %self.config.subject, "durable subscription open");
        Ok(NatsSubscription { messages })
    }

    /// Flush buffered publishes to the server.
    pub async fn flush(&self) -> Result<(), ChannelError> {
        self.client
            .flush()
            .await
            .map_err(|e| ChannelError::PublishFailed {
                subject: self.config.subject.clone(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Publisher for NatsChannel {
    async fn publish(&self, payload: Vec<u8>) -> Result<u64, ChannelError> {
        let subject = self.config.subject.clone();
        let publish_err = |reason: String| ChannelError::PublishFailed {
            subject: subject.clone(),
            reason,
        };

        let ack = self
            .jetstream
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| publish_err(e.to_string()))?
            .await
            .map_err(|e| publish_err(e.to_string()))?;

        debug!(subject = %subject, sequence = ack.sequence, "published");
        Ok(ack.sequence)
    }
}

/// Durable pull subscription on a JetStream stream.
pub struct NatsSubscription {
    messages: pull::Stream,
}

#[async_trait]
impl Subscription for NatsSubscription {
    type Delivery = NatsDelivery;

    async fn next(&mut self) -> Option<Result<NatsDelivery, ChannelError>> {
        let next = self.messages.next().await?;
        Some(
            next.map(|message| {
                let sequence = message
                    .info()
                    .map(|info| info.stream_sequence)
                    .unwrap_or_default();
                NatsDelivery { message, sequence }
            })
            .map_err(|e| ChannelError::ReceiveFailed {
                reason: e.to_string(),
            }),
        )
    }
}

/// One JetStream message awaiting acknowledgment.
pub struct NatsDelivery {
    message: jetstream::Message,
    sequence: u64,
}

#[async_trait]
impl Delivery for NatsDelivery {
    fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    fn sequence(&self) -> u64 {
        self.sequence
    }

    async fn ack(&self) -> Result<(), ChannelError> {
        self.message
            .ack()
            .await
            .map_err(|e| ChannelError::AckFailed {
                sequence: self.sequence,
                reason: e.to_string(),
            })
    }

    async fn nak(&self) -> Result<(), ChannelError> {
        self.message
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|e| ChannelError::AckFailed {
                sequence: self.sequence,
                reason: e.to_string(),
            })
    }
}
