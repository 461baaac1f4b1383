use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use bytes::Bytes;
use draftsync_provider::{EventSource, ProviderError, ReceivedMessage};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::GcpProviderError;
use crate::rest::RestClient;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PullRequest {
    max_messages: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<WireReceived>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceived {
    ack_id: String,
    message: WireMessage,
    #[serde(default)]
    delivery_attempt: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(default)]
    data: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
    #[serde(default)]
    message_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AckRequest<'a> {
    ack_ids: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyAckDeadline<'a> {
    ack_ids: &'a [String],
    ack_deadline_seconds: u32,
}

#[derive(Deserialize)]
struct Empty {}

fn decode(received: WireReceived) -> Result<ReceivedMessage, GcpProviderError> {
    let data = B64.decode(received.message.data.as_bytes()).map_err(|e| {
        GcpProviderError::InvalidPayload(format!(
            "message {} data is not base64: {e}",
            received.message.message_id
        ))
    })?;
    Ok(ReceivedMessage {
        ack_id: received.ack_id,
        message_id: received.message.message_id,
        attributes: received.message.attributes,
        data: Bytes::from(data),
        delivery_attempt: received.delivery_attempt,
    })
}

/// A Pub/Sub pull subscription driven over REST.
#[derive(Debug, Clone)]
pub struct PullSubscription {
    rest: RestClient,
    subscription_path: String,
}

impl PullSubscription {
    pub fn new(rest: RestClient, subscription_path: impl Into<String>) -> Self {
        Self {
            rest,
            subscription_path: subscription_path.into(),
        }
    }

    fn url(&self, verb: &str) -> String {
        format!(
            "{}/{}:{verb}",
            self.rest.endpoints().pubsub.trim_end_matches('/'),
            self.subscription_path
        )
    }
}

#[async_trait]
impl EventSource for PullSubscription {
    #[instrument(skip(self), fields(subscription = %self.subscription_path))]
    async fn pull(&self, max_messages: u32) -> Result<Vec<ReceivedMessage>, ProviderError> {
        let response: PullResponse = self
            .rest
            .send(
                Method::POST,
                &self.url("pull"),
                &PullRequest {
                    max_messages: max_messages.max(1),
                },
            )
            .await?;
        debug!(count = response.received_messages.len(), "pulled messages");
        response
            .received_messages
            .into_iter()
            .map(|m| decode(m).map_err(ProviderError::from))
            .collect()
    }

    async fn acknowledge(&self, ack_ids: &[String]) -> Result<(), ProviderError> {
        if ack_ids.is_empty() {
            return Ok(());
        }
        let _: Empty = self
            .rest
            .send(Method::POST, &self.url("acknowledge"), &AckRequest { ack_ids })
            .await?;
        Ok(())
    }

    async fn release(&self, ack_ids: &[String]) -> Result<(), ProviderError> {
        if ack_ids.is_empty() {
            return Ok(());
        }
        let body = ModifyAckDeadline {
            ack_ids,
            ack_deadline_seconds: 0,
        };
        let _: Empty = self
            .rest
            .send(Method::POST, &self.url("modifyAckDeadline"), &body)
            .await?;
        Ok(())
    }
}
