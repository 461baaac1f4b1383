use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// One role binding in an IAM policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamBinding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// An IAM policy as read from and written back to a resource.
///
/// The `etag` read with the policy must be sent back on write so concurrent
/// modifications are detected by the remote service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default)]
    pub bindings: Vec<IamBinding>,
}

impl IamPolicy {
    /// Add `member` to `role`, creating the binding when missing.
    ///
    /// Set-union semantics: existing members are never removed. Returns
    /// `true` when the policy changed.
    pub fn merge_binding(&mut self, role: &str, member: &str) -> bool {
        if let Some(binding) = self.bindings.iter_mut().find(|b| b.role == role) {
            if binding.members.iter().any(|m| m == member) {
                return false;
            }
            binding.members.push(member.to_owned());
            return true;
        }
        self.bindings.push(IamBinding {
            role: role.to_owned(),
            members: vec![member.to_owned()],
        });
        true
    }

    /// Whether `member` already holds `role`.
    pub fn grants(&self, role: &str, member: &str) -> bool {
        self.bindings
            .iter()
            .any(|b| b.role == role && b.members.iter().any(|m| m == member))
    }
}

/// A bucket notification configuration as reported by the storage service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketNotification {
    pub id: String,
    /// Topic the notification publishes to, in any of the storage service's
    /// accepted forms (`//pubsub.googleapis.com/projects/p/topics/t` or
    /// `projects/p/topics/t`).
    pub topic: String,
    #[serde(default)]
    pub event_types: Vec<String>,
    #[serde(default)]
    pub payload_format: String,
}

/// Desired bucket notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    /// Fully-qualified topic path.
    pub topic: String,
    pub event_types: Vec<String>,
    pub payload_format: String,
}

/// Administrative operations on the event-delivery infrastructure.
///
/// Every method is a single remote call; callers compose them into
/// idempotent reconciliation.
#[async_trait]
pub trait InfraAdmin: Send + Sync {
    /// Fully-qualified names of every topic in the project.
    async fn list_topics(&self, project_id: &str) -> Result<Vec<String>, ProviderError>;

    /// Create a topic. Returns [`ProviderError::AlreadyExists`] when a
    /// concurrent caller won the race.
    async fn create_topic(&self, topic_path: &str) -> Result<(), ProviderError>;

    /// Fully-qualified names of the subscriptions attached to a topic.
    async fn list_topic_subscriptions(
        &self,
        topic_path: &str,
    ) -> Result<Vec<String>, ProviderError>;

    /// Create a pull subscription on `topic_path`.
    async fn create_pull_subscription(
        &self,
        subscription_path: &str,
        topic_path: &str,
        ack_deadline_seconds: u32,
    ) -> Result<(), ProviderError>;

    /// Read the IAM policy of a topic.
    async fn get_topic_policy(&self, topic_path: &str) -> Result<IamPolicy, ProviderError>;

    /// Replace the IAM policy of a topic, returning the stored policy.
    async fn set_topic_policy(
        &self,
        topic_path: &str,
        policy: &IamPolicy,
    ) -> Result<IamPolicy, ProviderError>;

    /// Email of the service account the storage service publishes as.
    async fn storage_service_account(&self, project_id: &str) -> Result<String, ProviderError>;

    /// Notification configurations of a bucket.
    async fn list_notifications(
        &self,
        bucket: &str,
    ) -> Result<Vec<BucketNotification>, ProviderError>;

    /// Attach a notification configuration to a bucket.
    async fn create_notification(
        &self,
        bucket: &str,
        request: &NotificationRequest,
    ) -> Result<BucketNotification, ProviderError>;
}
