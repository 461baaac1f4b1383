use draftsync_lifecycle::BucketConfig;
use serde::Deserialize;

/// The bucket holding drafts and its event-delivery resources.
#[derive(Debug, Deserialize)]
pub struct BucketSection {
    #[serde(default = "default_name")]
    pub name: String,
    /// Topic short name. Defaults to `<name>-events`.
    pub topic: Option<String>,
    /// Subscription short name. Defaults to `<topic>-sub`.
    pub subscription: Option<String>,
    #[serde(default = "default_ack_deadline")]
    pub ack_deadline_seconds: u32,
    /// Event types the bucket notification is filtered to.
    #[serde(default = "default_event_types")]
    pub event_types: Vec<String>,
}

impl Default for BucketSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            topic: None,
            subscription: None,
            ack_deadline_seconds: default_ack_deadline(),
            event_types: default_event_types(),
        }
    }
}

impl BucketSection {
    /// Resolve names against `project_id`.
    pub fn to_bucket_config(&self, project_id: &str) -> BucketConfig {
        let mut config = BucketConfig::for_bucket(project_id, self.name.clone());
        if let Some(ref topic) = self.topic {
            config.topic_name.clone_from(topic);
            config.subscription_name = format!("{topic}-sub");
        }
        if let Some(ref subscription) = self.subscription {
            config.subscription_name.clone_from(subscription);
        }
        config.ack_deadline_seconds = self.ack_deadline_seconds;
        config.event_types.clone_from(&self.event_types);
        config
    }
}

fn default_name() -> String {
    "drafts".to_owned()
}

fn default_ack_deadline() -> u32 {
    10
}

fn default_event_types() -> Vec<String> {
    vec!["OBJECT_FINALIZE".to_owned(), "OBJECT_DELETE".to_owned()]
}
