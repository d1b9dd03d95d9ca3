//! Transport-neutral channel traits.

use async_trait::async_trait;
use order_core::ChannelError;

/// One message received on a durable subscription.
///
/// Until it is acknowledged the channel considers the message in flight and
/// may redeliver it to the same durable subscription later.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Raw message body.
    fn payload(&self) -> &[u8];

    /// Channel-assigned sequence number, monotonically increasing per stream.
    fn sequence(&self) -> u64;

    /// Mark the message as processed. It will not be delivered again.
    async fn ack(&self) -> Result<(), ChannelError>;

    /// Reject the message so the channel redelivers it.
    async fn nak(&self) -> Result<(), ChannelError>;
}

/// Durable subscription that yields deliveries one at a time.
#[async_trait]
pub trait Subscription: Send {
    type Delivery: Delivery;

    /// Wait for the next delivery.
    ///
    /// Returns `None` once the channel is closed and nothing is left to
    /// deliver.
    async fn next(&mut self) -> Option<Result<Self::Delivery, ChannelError>>;
}

/// Publishing side of the channel.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish one payload and return the sequence the channel assigned to it.
    async fn publish(&self, payload: Vec<u8>) -> Result<u64, ChannelError>;
}
