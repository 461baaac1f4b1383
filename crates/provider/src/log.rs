use draftsync_core::NotificationMessage;
use tracing::info;
use uuid::Uuid;

use crate::error::ProviderError;
use crate::publisher::Publisher;

/// A publisher that logs each message and reports success without
/// performing any external I/O.
///
/// Used when sending is switched off and in local development.
pub struct LogPublisher {
    name: String,
}

impl LogPublisher {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Publisher for LogPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, message: &NotificationMessage) -> Result<String, ProviderError> {
        let id = Uuid::new_v4().to_string();
        info!(
            publisher = %self.name,
            kind = message.kind.as_str(),
            subject = %message.key.subject_id,
            event_id = %message.key.event_id,
            grouping = %message.key.grouping_id,
            message_id = %id,
            "log publisher skipped sending notification"
        );
        Ok(id)
    }

    #[allow(clippy::unused_async)]
    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
