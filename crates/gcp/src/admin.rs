use async_trait::async_trait;
use draftsync_provider::{
    BucketNotification, IamPolicy, InfraAdmin, NotificationRequest, ProviderError,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::rest::RestClient;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicPage {
    #[serde(default)]
    topics: Vec<TopicName>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct TopicName {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionPage {
    #[serde(default)]
    subscriptions: Vec<String>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSubscription<'a> {
    topic: &'a str,
    ack_deadline_seconds: u32,
}

#[derive(Serialize)]
struct SetPolicy<'a> {
    policy: &'a IamPolicy,
}

#[derive(Deserialize)]
struct ServiceAccount {
    email_address: String,
}

/// Storage JSON API notification resource; uses snake_case field names.
#[derive(Serialize, Deserialize)]
struct NotificationResource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    id: String,
    topic: String,
    #[serde(default)]
    event_types: Vec<String>,
    #[serde(default)]
    payload_format: String,
}

#[derive(Deserialize)]
struct NotificationList {
    #[serde(default)]
    items: Vec<NotificationResource>,
}

impl From<NotificationResource> for BucketNotification {
    fn from(resource: NotificationResource) -> Self {
        Self {
            id: resource.id,
            topic: resource.topic,
            event_types: resource.event_types,
            payload_format: resource.payload_format,
        }
    }
}

#[derive(Deserialize)]
struct Empty {}

/// [`InfraAdmin`] over the Pub/Sub and Cloud Storage REST APIs.
#[derive(Debug, Clone)]
pub struct GcpInfraAdmin {
    rest: RestClient,
}

impl GcpInfraAdmin {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    fn pubsub(&self, path: &str) -> String {
        format!("{}/{path}", self.rest.endpoints().pubsub.trim_end_matches('/'))
    }

    fn storage(&self, path: &str) -> String {
        format!("{}/{path}", self.rest.endpoints().storage.trim_end_matches('/'))
    }
}

#[async_trait]
impl InfraAdmin for GcpInfraAdmin {
    #[instrument(skip(self))]
    async fn list_topics(&self, project_id: &str) -> Result<Vec<String>, ProviderError> {
        let url = self.pubsub(&format!("projects/{project_id}/topics"));
        let mut names = Vec::new();
        let mut page_token = String::new();
        loop {
            let page: TopicPage = self
                .rest
                .get(&url, &[("pageToken", page_token.as_str())])
                .await?;
            names.extend(page.topics.into_iter().map(|t| t.name));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = token,
                _ => return Ok(names),
            }
        }
    }

    #[instrument(skip(self))]
    async fn create_topic(&self, topic_path: &str) -> Result<(), ProviderError> {
        let _: TopicName = self
            .rest
            .send(Method::PUT, &self.pubsub(topic_path), &serde_json::json!({}))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_topic_subscriptions(
        &self,
        topic_path: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let url = self.pubsub(&format!("{topic_path}/subscriptions"));
        let mut names = Vec::new();
        let mut page_token = String::new();
        loop {
            let page: SubscriptionPage = self
                .rest
                .get(&url, &[("pageToken", page_token.as_str())])
                .await?;
            names.extend(page.subscriptions);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = token,
                _ => return Ok(names),
            }
        }
    }

    #[instrument(skip(self))]
    async fn create_pull_subscription(
        &self,
        subscription_path: &str,
        topic_path: &str,
        ack_deadline_seconds: u32,
    ) -> Result<(), ProviderError> {
        let body = CreateSubscription {
            topic: topic_path,
            ack_deadline_seconds,
        };
        let _: Empty = self
            .rest
            .send(Method::PUT, &self.pubsub(subscription_path), &body)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_topic_policy(&self, topic_path: &str) -> Result<IamPolicy, ProviderError> {
        let url = self.pubsub(&format!("{topic_path}:getIamPolicy"));
        Ok(self.rest.get(&url, &[]).await?)
    }

    #[instrument(skip(self, policy))]
    async fn set_topic_policy(
        &self,
        topic_path: &str,
        policy: &IamPolicy,
    ) -> Result<IamPolicy, ProviderError> {
        let url = self.pubsub(&format!("{topic_path}:setIamPolicy"));
        Ok(self
            .rest
            .send(Method::POST, &url, &SetPolicy { policy })
            .await?)
    }

    #[instrument(skip(self))]
    async fn storage_service_account(&self, project_id: &str) -> Result<String, ProviderError> {
        let url = self.storage(&format!("projects/{project_id}/serviceAccount"));
        let account: ServiceAccount = self.rest.get(&url, &[]).await?;
        Ok(account.email_address)
    }

    #[instrument(skip(self))]
    async fn list_notifications(
        &self,
        bucket: &str,
    ) -> Result<Vec<BucketNotification>, ProviderError> {
        let url = self.storage(&format!("b/{bucket}/notificationConfigs"));
        let list: NotificationList = self.rest.get(&url, &[]).await?;
        Ok(list.items.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, request), fields(topic = %request.topic))]
    async fn create_notification(
        &self,
        bucket: &str,
        request: &NotificationRequest,
    ) -> Result<BucketNotification, ProviderError> {
        let url = self.storage(&format!("b/{bucket}/notificationConfigs"));
        let body = NotificationResource {
            id: String::new(),
            topic: request.topic.clone(),
            event_types: request.event_types.clone(),
            payload_format: request.payload_format.clone(),
        };
        let created: NotificationResource = self.rest.send(Method::POST, &url, &body).await?;
        Ok(created.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GcpBaseConfig, RestEndpoints};

    fn admin() -> GcpInfraAdmin {
        let config = GcpBaseConfig::new("p")
            .with_access_token("t")
            .with_rest_endpoints(RestEndpoints {
                pubsub: "http://localhost:8085/v1/".into(),
                storage: "http://localhost:4443/storage/v1".into(),
                ..RestEndpoints::default()
            });
        GcpInfraAdmin::new(RestClient::new(&config).unwrap())
    }

    #[test]
    fn urls_join_base_and_resource() {
        let admin = admin();
        assert_eq!(
            admin.pubsub("projects/p/topics/t:getIamPolicy"),
            "http://localhost:8085/v1/projects/p/topics/t:getIamPolicy"
        );
        assert_eq!(
            admin.storage("b/drafts/notificationConfigs"),
            "http://localhost:4443/storage/v1/b/drafts/notificationConfigs"
        );
    }

    #[test]
    fn notification_resource_uses_snake_case() {
        let json = serde_json::json!({
            "kind": "storage#notification",
            "id": "7",
            "topic": "//pubsub.googleapis.com/projects/p/topics/t",
            "event_types": ["OBJECT_FINALIZE", "OBJECT_DELETE"],
            "payload_format": "JSON_API_V1",
            "etag": "7"
        });
        let resource: NotificationResource = serde_json::from_value(json).unwrap();
        let notification = BucketNotification::from(resource);
        assert_eq!(notification.id, "7");
        assert_eq!(notification.event_types.len(), 2);
    }

    #[test]
    fn topic_pages_tolerate_missing_fields() {
        let page: TopicPage = serde_json::from_str("{}").unwrap();
        assert!(page.topics.is_empty());
        assert!(page.next_page_token.is_none());
    }
}
