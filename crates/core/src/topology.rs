use serde::{Deserialize, Serialize};

/// The event-delivery resources wired to one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTopology {
    pub project_id: String,
    pub bucket_name: String,
    pub topic_name: String,
    pub subscription_name: String,
    /// Id of the bucket notification publishing to `topic_name`.
    pub notification_id: String,
}

impl BucketTopology {
    /// `projects/<project>/topics/<topic>`
    pub fn topic_path(&self) -> String {
        topic_path(&self.project_id, &self.topic_name)
    }

    /// `projects/<project>/subscriptions/<subscription>`
    pub fn subscription_path(&self) -> String {
        subscription_path(&self.project_id, &self.subscription_name)
    }
}

/// Fully-qualified topic resource name.
pub fn topic_path(project_id: &str, topic: &str) -> String {
    format!("projects/{project_id}/topics/{topic}")
}

/// Fully-qualified subscription resource name.
pub fn subscription_path(project_id: &str, subscription: &str) -> String {
    format!("projects/{project_id}/subscriptions/{subscription}")
}

/// Last path segment of a resource name (`projects/p/topics/t` → `t`).
pub fn short_name(resource: &str) -> &str {
    resource.rsplit('/').next().unwrap_or(resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_paths() {
        let topology = BucketTopology {
            project_id: "p1".into(),
            bucket_name: "drafts".into(),
            topic_name: "drafts-events".into(),
            subscription_name: "drafts-sub".into(),
            notification_id: "7".into(),
        };
        assert_eq!(topology.topic_path(), "projects/p1/topics/drafts-events");
        assert_eq!(
            topology.subscription_path(),
            "projects/p1/subscriptions/drafts-sub"
        );
    }

    #[test]
    fn short_name_strips_prefix() {
        assert_eq!(short_name("projects/p1/topics/drafts-events"), "drafts-events");
        assert_eq!(short_name("//pubsub.googleapis.com/projects/p/topics/t"), "t");
        assert_eq!(short_name("plain"), "plain");
    }
}
