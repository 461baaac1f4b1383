use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use draftsync_lifecycle::{BucketConfig, InfraProvisioner, InfraSection, LifecycleError};
use draftsync_provider::{
    BucketNotification, IamPolicy, InfraAdmin, NotificationRequest, ProviderError,
};

#[derive(Default)]
struct State {
    topics: Vec<String>,
    subscriptions: HashMap<String, Vec<String>>,
    policies: HashMap<String, IamPolicy>,
    notifications: HashMap<String, Vec<BucketNotification>>,
    creates: usize,
}

/// Admin double keeping resources in memory and counting create calls.
#[derive(Default)]
struct FakeAdmin {
    state: Mutex<State>,
    /// Fail `create_topic` with "already exists" once, as a concurrent
    /// provisioner would cause.
    race_topic: Mutex<bool>,
    unavailable: Mutex<bool>,
}

impl FakeAdmin {
    fn check(&self) -> Result<(), ProviderError> {
        if *self.unavailable.lock().unwrap() {
            return Err(ProviderError::Connection("admin api down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl InfraAdmin for FakeAdmin {
    async fn list_topics(&self, project_id: &str) -> Result<Vec<String>, ProviderError> {
        self.check()?;
        let prefix = format!("projects/{project_id}/topics/");
        Ok(self
            .state
            .lock()
            .unwrap()
            .topics
            .iter()
            .filter(|t| t.starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn create_topic(&self, topic_path: &str) -> Result<(), ProviderError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut *self.race_topic.lock().unwrap()) {
            state.topics.push(topic_path.to_owned());
            return Err(ProviderError::AlreadyExists(topic_path.to_owned()));
        }
        state.creates += 1;
        state.topics.push(topic_path.to_owned());
        Ok(())
    }

    async fn list_topic_subscriptions(&self, topic_path: &str) -> Result<Vec<String>, ProviderError> {
        self.check()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .get(topic_path)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_pull_subscription(
        &self,
        subscription_path: &str,
        topic_path: &str,
        ack_deadline_seconds: u32,
    ) -> Result<(), ProviderError> {
        self.check()?;
        assert_eq!(ack_deadline_seconds, 10);
        let mut state = self.state.lock().unwrap();
        state.creates += 1;
        state
            .subscriptions
            .entry(topic_path.to_owned())
            .or_default()
            .push(subscription_path.to_owned());
        Ok(())
    }

    async fn get_topic_policy(&self, topic_path: &str) -> Result<IamPolicy, ProviderError> {
        self.check()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .policies
            .get(topic_path)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_topic_policy(
        &self,
        topic_path: &str,
        policy: &IamPolicy,
    ) -> Result<IamPolicy, ProviderError> {
        self.check()?;
        self.state
            .lock()
            .unwrap()
            .policies
            .insert(topic_path.to_owned(), policy.clone());
        Ok(policy.clone())
    }

    async fn storage_service_account(&self, project_id: &str) -> Result<String, ProviderError> {
        self.check()?;
        Ok(format!("service-{project_id}@gs-project-accounts.iam.gserviceaccount.com"))
    }

    async fn list_notifications(&self, bucket: &str) -> Result<Vec<BucketNotification>, ProviderError> {
        self.check()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .notifications
            .get(bucket)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_notification(
        &self,
        bucket: &str,
        request: &NotificationRequest,
    ) -> Result<BucketNotification, ProviderError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        state.creates += 1;
        let list = state.notifications.entry(bucket.to_owned()).or_default();
        let created = BucketNotification {
            id: (list.len() + 1).to_string(),
            // Storage reports topics in full resource form.
            topic: format!("//pubsub.googleapis.com/{}", request.topic),
            event_types: request.event_types.clone(),
            payload_format: request.payload_format.clone(),
        };
        list.push(created.clone());
        Ok(created)
    }
}

fn config() -> BucketConfig {
    BucketConfig::for_bucket("proj", "drafts")
}

#[tokio::test]
async fn ensure_creates_everything_once() {
    let admin = Arc::new(FakeAdmin::default());
    let provisioner = InfraProvisioner::new(admin.clone());

    let first = provisioner.ensure(&config()).await.unwrap();
    assert_eq!(first.topic_path(), "projects/proj/topics/drafts-events");
    assert_eq!(first.notification_id, "1");
    assert_eq!(admin.state.lock().unwrap().creates, 3);

    let policy = admin.state.lock().unwrap().policies["projects/proj/topics/drafts-events"].clone();
    assert!(policy.grants(
        "roles/pubsub.publisher",
        "serviceAccount:service-proj@gs-project-accounts.iam.gserviceaccount.com"
    ));

    let notification = admin.state.lock().unwrap().notifications["drafts"][0].clone();
    assert_eq!(notification.event_types, ["OBJECT_FINALIZE", "OBJECT_DELETE"]);
    assert_eq!(notification.payload_format, "JSON_API_V1");
}

#[tokio::test]
async fn ensure_is_idempotent() {
    let admin = Arc::new(FakeAdmin::default());
    let provisioner = InfraProvisioner::new(admin.clone());

    let first = provisioner.ensure(&config()).await.unwrap();
    let second = provisioner.ensure(&config()).await.unwrap();

    assert_eq!(first, second);
    let state = admin.state.lock().unwrap();
    assert_eq!(state.creates, 3);
    assert_eq!(state.topics.len(), 1);
    assert_eq!(state.notifications["drafts"].len(), 1);
    let policy = &state.policies["projects/proj/topics/drafts-events"];
    assert_eq!(policy.bindings.len(), 1);
    assert_eq!(policy.bindings[0].members.len(), 1);
}

#[tokio::test]
async fn policy_merge_keeps_foreign_bindings() {
    let admin = Arc::new(FakeAdmin::default());
    let mut existing = IamPolicy::default();
    existing.merge_binding("roles/pubsub.subscriber", "user:ops@example.com");
    admin
        .state
        .lock()
        .unwrap()
        .policies
        .insert("projects/proj/topics/drafts-events".into(), existing);

    InfraProvisioner::new(admin.clone())
        .ensure(&config())
        .await
        .unwrap();

    let policy = admin.state.lock().unwrap().policies["projects/proj/topics/drafts-events"].clone();
    assert!(policy.grants("roles/pubsub.subscriber", "user:ops@example.com"));
    assert!(policy.grants(
        "roles/pubsub.publisher",
        "serviceAccount:service-proj@gs-project-accounts.iam.gserviceaccount.com"
    ));
}

#[tokio::test]
async fn concurrent_topic_creation_is_tolerated() {
    let admin = Arc::new(FakeAdmin::default());
    *admin.race_topic.lock().unwrap() = true;

    let topology = InfraProvisioner::new(admin.clone())
        .ensure(&config())
        .await
        .unwrap();
    assert_eq!(topology.topic_name, "drafts-events");
}

#[tokio::test]
async fn admin_failure_is_an_infrastructure_error() {
    let admin = Arc::new(FakeAdmin::default());
    *admin.unavailable.lock().unwrap() = true;

    let err = InfraProvisioner::new(admin)
        .ensure(&config())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Infrastructure(ProviderError::Connection(_))));
}

#[tokio::test]
async fn describe_sections() {
    let admin = Arc::new(FakeAdmin::default());
    let provisioner = InfraProvisioner::new(admin);
    provisioner.ensure(&config()).await.unwrap();

    let all = provisioner.describe(&config(), InfraSection::All).await.unwrap();
    assert_eq!(all.topics.as_deref(), Some(&["drafts-events".to_owned()][..]));
    assert_eq!(
        all.subscriptions.as_ref().unwrap()["drafts-events"],
        ["drafts-events-sub"]
    );
    assert_eq!(all.notifications.as_ref().unwrap().len(), 1);

    let topics = provisioner.describe(&config(), InfraSection::Topics).await.unwrap();
    assert!(topics.subscriptions.is_none());
    assert!(topics.notifications.is_none());

    let json = serde_json::to_value(
        provisioner
            .describe(&config(), InfraSection::Notifications)
            .await
            .unwrap(),
    )
    .unwrap();
    assert!(json.get("topics").is_none());
    assert_eq!(json["notifications"][0]["payloadFormat"], "JSON_API_V1");
}
