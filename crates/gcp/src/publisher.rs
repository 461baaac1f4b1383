use std::sync::Arc;

use draftsync_core::NotificationMessage;
use draftsync_provider::{ProviderError, Publisher};
use google_cloud_pubsub::client::Publisher as PubSubClient;
use tracing::{error, info, instrument};

use crate::auth::build_gcp_credentials;
use crate::config::GcpBaseConfig;
use crate::error::classify_gcp_error;

/// Publishes notification messages to a Pub/Sub topic.
///
/// Message data is the JSON encoding of [`NotificationMessage`]; the ordering
/// key is derived from the notification key so all publishes for one
/// notification stay in order.
pub struct PubSubPublisher {
    topic_path: String,
    publisher: PubSubClient,
}

impl std::fmt::Debug for PubSubPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSubPublisher")
            .field("topic_path", &self.topic_path)
            .finish_non_exhaustive()
    }
}

impl PubSubPublisher {
    /// Resolve credentials and build a publisher for `topic_path`
    /// (`projects/<p>/topics/<t>`).
    pub async fn new(
        config: &GcpBaseConfig,
        topic_path: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let topic_path = topic_path.into();
        let credentials = build_gcp_credentials(
            config.credentials_path.as_deref(),
            config.credentials_json.as_deref(),
        )
        .await
        .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        let mut builder = PubSubClient::builder(topic_path.as_str());
        if let Some(ref endpoint) = config.endpoint_url {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(creds) = credentials {
            builder = builder.with_credentials(creds);
        }
        let publisher = builder
            .build()
            .await
            .map_err(|e| ProviderError::Configuration(format!("Pub/Sub publisher error: {e}")))?;

        Ok(Self {
            topic_path,
            publisher,
        })
    }

    fn build_message(
        message: &NotificationMessage,
    ) -> Result<google_cloud_pubsub::model::Message, ProviderError> {
        let data =
            serde_json::to_vec(message).map_err(|e| ProviderError::Serialization(e.to_string()))?;
        let attributes = [
            ("kind".to_owned(), message.kind.as_str().to_owned()),
            ("eventId".to_owned(), message.key.event_id.to_string()),
            ("groupingId".to_owned(), message.key.grouping_id.clone()),
            ("app".to_owned(), message.key.app.clone()),
            ("namespace".to_owned(), message.key.namespace.clone()),
        ];
        Ok(google_cloud_pubsub::model::Message::new()
            .set_data(bytes::Bytes::from(data))
            .set_attributes(attributes)
            .set_ordering_key(message.key.ordering_key()))
    }
}

impl Publisher for PubSubPublisher {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "gcp-pubsub"
    }

    #[instrument(skip(self, message), fields(topic = %self.topic_path, kind = message.kind.as_str(), event_id = %message.key.event_id))]
    async fn publish(&self, message: &NotificationMessage) -> Result<String, ProviderError> {
        let msg = Self::build_message(message)?;
        let message_id =
            self.publisher
                .publish(msg)
                .await
                .map_err(|e: Arc<google_cloud_pubsub::Error>| {
                    let err_str = e.to_string();
                    error!(error = %err_str, "Pub/Sub publish failed");
                    let gcp_err: ProviderError = classify_gcp_error(&err_str).into();
                    gcp_err
                })?;
        info!(message_id = %message_id, "notification published");
        Ok(message_id)
    }

    #[allow(clippy::unused_async)]
    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use draftsync_core::{NotificationKey, SubjectId};
    use uuid::Uuid;

    use super::*;

    #[test]
    fn message_carries_key_attributes() {
        let notification = NotificationMessage::done(NotificationKey {
            subject_id: SubjectId::parse("01017012345").unwrap(),
            event_id: Uuid::nil(),
            grouping_id: "STANDARD".into(),
            app: "draftsync".into(),
            namespace: "team".into(),
        });
        let msg = PubSubPublisher::build_message(&notification).unwrap();
        assert_eq!(msg.attributes["kind"], "DONE");
        assert_eq!(msg.attributes["groupingId"], "STANDARD");
        assert_eq!(msg.ordering_key, notification.key.ordering_key());
        let decoded: NotificationMessage = serde_json::from_slice(&msg.data).unwrap();
        assert_eq!(decoded, notification);
    }
}
