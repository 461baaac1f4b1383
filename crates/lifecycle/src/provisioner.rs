//! Declarative provisioning of the event-delivery wiring for a bucket.
//!
//! [`InfraProvisioner::ensure`] converges four independent resources:
//!
//! 1. the topic the bucket publishes to,
//! 2. a pull subscription on that topic,
//! 3. the publisher role for the storage service account on the topic,
//! 4. the bucket notification itself.
//!
//! Each step lists before it creates and treats "already exists" as
//! success, so concurrent or repeated runs converge on the same topology.

use std::collections::BTreeMap;
use std::sync::Arc;

use draftsync_core::topology::{short_name, subscription_path, topic_path};
use draftsync_core::BucketTopology;
use draftsync_provider::{BucketNotification, InfraAdmin, NotificationRequest, ProviderError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::LifecycleError;

/// Role granted to the storage service account on the topic.
pub const PUBLISHER_ROLE: &str = "roles/pubsub.publisher";

/// Payload format requested for bucket notifications.
pub const PAYLOAD_FORMAT: &str = "JSON_API_V1";

const PUBSUB_RESOURCE_PREFIX: &str = "//pubsub.googleapis.com/";

/// Desired event-delivery configuration for one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    pub project_id: String,
    pub bucket_name: String,
    pub topic_name: String,
    pub subscription_name: String,
    pub ack_deadline_seconds: u32,
    /// Event types the notification is filtered to.
    pub event_types: Vec<String>,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            bucket_name: String::new(),
            topic_name: String::new(),
            subscription_name: String::new(),
            ack_deadline_seconds: 10,
            event_types: vec!["OBJECT_FINALIZE".to_owned(), "OBJECT_DELETE".to_owned()],
        }
    }
}

impl BucketConfig {
    /// A configuration with topic and subscription names derived from the
    /// bucket name.
    pub fn for_bucket(project_id: impl Into<String>, bucket_name: impl Into<String>) -> Self {
        let bucket_name = bucket_name.into();
        Self {
            project_id: project_id.into(),
            topic_name: format!("{bucket_name}-events"),
            subscription_name: format!("{bucket_name}-events-sub"),
            bucket_name,
            ..Self::default()
        }
    }

    pub fn topic_path(&self) -> String {
        topic_path(&self.project_id, &self.topic_name)
    }

    pub fn subscription_path(&self) -> String {
        subscription_path(&self.project_id, &self.subscription_name)
    }
}

/// Read-only view of the event-delivery resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InfraView {
    /// Topic short names in the project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
    /// Subscription short names per topic short name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriptions: Option<BTreeMap<String, Vec<String>>>,
    /// Notification configurations on the bucket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<Vec<BucketNotification>>,
}

/// Which part of the infrastructure to describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfraSection {
    Topics,
    Subscriptions,
    Notifications,
    All,
}

impl InfraSection {
    /// Unknown names select the full view.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "topics" => Self::Topics,
            "subscriptions" => Self::Subscriptions,
            "notifications" => Self::Notifications,
            _ => Self::All,
        }
    }
}

/// Converges topic, subscription, IAM binding and bucket notification.
pub struct InfraProvisioner {
    admin: Arc<dyn InfraAdmin>,
}

impl InfraProvisioner {
    pub fn new(admin: Arc<dyn InfraAdmin>) -> Self {
        Self { admin }
    }

    /// Make sure every resource for `config` exists and return the
    /// resulting topology.
    #[instrument(skip_all, fields(bucket = %config.bucket_name, topic = %config.topic_name))]
    pub async fn ensure(&self, config: &BucketConfig) -> Result<BucketTopology, LifecycleError> {
        let topic = config.topic_path();
        self.ensure_topic(config, &topic).await?;
        self.ensure_subscription(config, &topic).await?;
        self.ensure_publisher_binding(config, &topic).await?;
        let notification_id = self.ensure_notification(config, &topic).await?;

        info!(notification_id, "bucket event delivery provisioned");
        Ok(BucketTopology {
            project_id: config.project_id.clone(),
            bucket_name: config.bucket_name.clone(),
            topic_name: config.topic_name.clone(),
            subscription_name: config.subscription_name.clone(),
            notification_id,
        })
    }

    async fn ensure_topic(&self, config: &BucketConfig, topic: &str) -> Result<(), LifecycleError> {
        let topics = self
            .admin
            .list_topics(&config.project_id)
            .await
            .map_err(LifecycleError::Infrastructure)?;
        if topics.iter().any(|t| t == topic) {
            debug!("topic exists");
            return Ok(());
        }
        tolerate_exists(self.admin.create_topic(topic).await)?;
        info!("topic created");
        Ok(())
    }

    async fn ensure_subscription(
        &self,
        config: &BucketConfig,
        topic: &str,
    ) -> Result<(), LifecycleError> {
        let subscription = config.subscription_path();
        let subscriptions = self
            .admin
            .list_topic_subscriptions(topic)
            .await
            .map_err(LifecycleError::Infrastructure)?;
        if subscriptions.iter().any(|s| *s == subscription) {
            debug!(subscription = %config.subscription_name, "subscription exists");
            return Ok(());
        }
        tolerate_exists(
            self.admin
                .create_pull_subscription(&subscription, topic, config.ack_deadline_seconds)
                .await,
        )?;
        info!(subscription = %config.subscription_name, "pull subscription created");
        Ok(())
    }

    /// Always runs: a merge of one binding into the current policy.
    async fn ensure_publisher_binding(
        &self,
        config: &BucketConfig,
        topic: &str,
    ) -> Result<(), LifecycleError> {
        let account = self
            .admin
            .storage_service_account(&config.project_id)
            .await
            .map_err(LifecycleError::Infrastructure)?;
        let member = format!("serviceAccount:{account}");

        let mut policy = self
            .admin
            .get_topic_policy(topic)
            .await
            .map_err(LifecycleError::Infrastructure)?;
        if policy.merge_binding(PUBLISHER_ROLE, &member) {
            self.admin
                .set_topic_policy(topic, &policy)
                .await
                .map_err(LifecycleError::Infrastructure)?;
            info!(role = PUBLISHER_ROLE, "publisher binding added");
        } else {
            debug!(role = PUBLISHER_ROLE, "publisher binding present");
        }
        Ok(())
    }

    async fn ensure_notification(
        &self,
        config: &BucketConfig,
        topic: &str,
    ) -> Result<String, LifecycleError> {
        let existing = self
            .admin
            .list_notifications(&config.bucket_name)
            .await
            .map_err(LifecycleError::Infrastructure)?;
        if let Some(found) = existing
            .into_iter()
            .find(|n| normalize_topic(&n.topic) == topic)
        {
            debug!(notification_id = %found.id, "bucket notification exists");
            return Ok(found.id);
        }

        let request = NotificationRequest {
            topic: topic.to_owned(),
            event_types: config.event_types.clone(),
            payload_format: PAYLOAD_FORMAT.to_owned(),
        };
        let created = self
            .admin
            .create_notification(&config.bucket_name, &request)
            .await
            .map_err(LifecycleError::Infrastructure)?;
        info!(notification_id = %created.id, "bucket notification created");
        Ok(created.id)
    }

    /// Describe the resources relevant to `config` without mutating them.
    #[instrument(skip_all, fields(bucket = %config.bucket_name))]
    pub async fn describe(
        &self,
        config: &BucketConfig,
        section: InfraSection,
    ) -> Result<InfraView, LifecycleError> {
        let mut view = InfraView::default();
        let all = section == InfraSection::All;

        let topics = if all || section != InfraSection::Notifications {
            Some(
                self.admin
                    .list_topics(&config.project_id)
                    .await
                    .map_err(LifecycleError::Infrastructure)?,
            )
        } else {
            None
        };

        if all || section == InfraSection::Subscriptions {
            let mut subscriptions = BTreeMap::new();
            for topic in topics.iter().flatten() {
                let subs = self
                    .admin
                    .list_topic_subscriptions(topic)
                    .await
                    .map_err(LifecycleError::Infrastructure)?;
                subscriptions.insert(
                    short_name(topic).to_owned(),
                    subs.iter().map(|s| short_name(s).to_owned()).collect(),
                );
            }
            view.subscriptions = Some(subscriptions);
        }
        if all || section == InfraSection::Topics {
            view.topics = topics.map(|t| t.iter().map(|n| short_name(n).to_owned()).collect());
        }
        if all || section == InfraSection::Notifications {
            view.notifications = Some(
                self.admin
                    .list_notifications(&config.bucket_name)
                    .await
                    .map_err(LifecycleError::Infrastructure)?,
            );
        }
        Ok(view)
    }
}

/// Strip the `//pubsub.googleapis.com/` prefix storage reports topics with.
pub fn normalize_topic(topic: &str) -> &str {
    topic.strip_prefix(PUBSUB_RESOURCE_PREFIX).unwrap_or(topic)
}

fn tolerate_exists(result: Result<(), ProviderError>) -> Result<(), LifecycleError> {
    match result {
        Err(e) if e.is_already_exists() => {
            debug!("resource created concurrently");
            Ok(())
        }
        other => other.map_err(LifecycleError::Infrastructure),
    }
}
