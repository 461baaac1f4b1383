use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ProviderError;

/// One message handed out by a pull subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Handle used to acknowledge this delivery.
    pub ack_id: String,
    pub message_id: String,
    pub attributes: HashMap<String, String>,
    pub data: Bytes,
    /// Delivery attempt reported by the broker, when it tracks one.
    pub delivery_attempt: Option<u32>,
}

/// An at-least-once message source with explicit acknowledgement.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch up to `max_messages` messages. May return an empty batch.
    async fn pull(&self, max_messages: u32) -> Result<Vec<ReceivedMessage>, ProviderError>;

    /// Acknowledge deliveries so they are not redelivered.
    async fn acknowledge(&self, ack_ids: &[String]) -> Result<(), ProviderError>;

    /// Release deliveries for immediate redelivery.
    async fn release(&self, ack_ids: &[String]) -> Result<(), ProviderError>;
}
