use async_trait::async_trait;
use draftsync_core::NotificationMessage;

use crate::error::ProviderError;

/// Strongly-typed publisher of keyed notifications with native `async fn`.
///
/// Not object-safe; every `Publisher` implements [`DynPublisher`] through a
/// blanket implementation for use behind `Arc<dyn DynPublisher>`.
pub trait Publisher: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Publish `message`, keyed by [`NotificationKey::ordering_key`], and
    /// return the id assigned by the messaging system.
    ///
    /// [`NotificationKey::ordering_key`]: draftsync_core::NotificationKey::ordering_key
    fn publish(
        &self,
        message: &NotificationMessage,
    ) -> impl std::future::Future<Output = Result<String, ProviderError>> + Send;

    /// Verify the messaging system is reachable.
    fn health_check(&self) -> impl std::future::Future<Output = Result<(), ProviderError>> + Send;
}

/// Object-safe publisher trait for use behind `Arc<dyn DynPublisher>`.
#[async_trait]
pub trait DynPublisher: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, message: &NotificationMessage) -> Result<String, ProviderError>;

    async fn health_check(&self) -> Result<(), ProviderError>;
}

#[async_trait]
impl<T: Publisher + Sync> DynPublisher for T {
    fn name(&self) -> &str {
        Publisher::name(self)
    }

    async fn publish(&self, message: &NotificationMessage) -> Result<String, ProviderError> {
        Publisher::publish(self, message).await
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Publisher::health_check(self).await
    }
}
