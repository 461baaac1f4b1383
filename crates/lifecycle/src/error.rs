use std::future::Future;
use std::time::Duration;

use draftsync_crypto::CryptoError;
use draftsync_provider::ProviderError;
use draftsync_state::StateError;
use thiserror::Error;

/// Why an event cannot be acted upon.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unprocessable {
    #[error("missing attribute {0}")]
    MissingAttribute(&'static str),

    #[error("unknown event type {0:?}")]
    UnknownEventType(String),

    #[error("payload is not a JSON object: {0}")]
    InvalidPayload(String),

    #[error("missing metadata key {0}")]
    MissingMetadata(&'static str),

    #[error("invalid metadata {key}: {reason}")]
    InvalidMetadata { key: &'static str, reason: String },
}

/// Errors raised while provisioning, reconciling or storing drafts.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A provisioning or administrative call failed.
    #[error("infrastructure error: {0}")]
    Infrastructure(#[source] ProviderError),

    /// The event is malformed or not actionable.
    #[error("unprocessable event: {0}")]
    Unprocessable(#[from] Unprocessable),

    /// The downstream messaging system rejected or did not take the message.
    #[error("publish failed: {0}")]
    Publish(#[source] ProviderError),

    /// The local draft record could not be read or written.
    #[error("persistence failed: {0}")]
    Persistence(#[from] StateError),

    /// Encryption, decryption or key management failed.
    #[error("crypto failure: {0}")]
    Crypto(#[from] CryptoError),

    /// Object storage I/O failed.
    #[error("object storage failure: {0}")]
    Storage(#[source] ProviderError),

    /// An attachment of a type outside the accepted set.
    #[error("content type {0:?} is not accepted")]
    UnsupportedContentType(String),

    /// A remote call did not finish within its time bound.
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },
}

/// What the subscriber does with the message that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge: redelivery cannot help.
    Acknowledge,
    /// Leave unacknowledged so the broker redelivers.
    Redeliver,
}

impl LifecycleError {
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Unprocessable(_) | Self::UnsupportedContentType(_) => Disposition::Acknowledge,
            _ => Disposition::Redeliver,
        }
    }
}

/// Run `fut` with an upper bound on its duration.
pub(crate) async fn bounded<T>(
    operation: &'static str,
    limit: Duration,
    fut: impl Future<Output = T>,
) -> Result<T, LifecycleError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| LifecycleError::Timeout { operation })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unprocessable_events_are_acknowledged() {
        let err = LifecycleError::from(Unprocessable::MissingMetadata("formType"));
        assert_eq!(err.disposition(), Disposition::Acknowledge);

        let transient = [
            LifecycleError::Publish(ProviderError::RateLimited),
            LifecycleError::Persistence(StateError::Timeout),
            LifecycleError::Infrastructure(ProviderError::Connection("reset".into())),
            LifecycleError::Crypto(CryptoError::KmsUnavailable("503".into())),
            LifecycleError::Timeout { operation: "publish" },
        ];
        for err in transient {
            assert_eq!(err.disposition(), Disposition::Redeliver, "{err}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_reports_the_operation() {
        let slow = tokio::time::sleep(Duration::from_secs(60));
        let err = bounded("publish", Duration::from_secs(1), slow)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Timeout { operation: "publish" }));

        let fast = bounded("publish", Duration::from_secs(1), async { 7 }).await;
        assert_eq!(fast.unwrap(), 7);
    }

    #[test]
    fn display() {
        let err = LifecycleError::from(Unprocessable::InvalidMetadata {
            key: "draftId",
            reason: "not a uuid".into(),
        });
        assert_eq!(
            err.to_string(),
            "unprocessable event: invalid metadata draftId: not a uuid"
        );
    }
}
