use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Base URLs of the Google REST APIs used for administration, pull
/// subscriptions and key management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestEndpoints {
    pub pubsub: String,
    pub storage: String,
    pub kms: String,
    /// Metadata server used to mint access tokens on GCE/GKE.
    pub metadata: String,
}

impl Default for RestEndpoints {
    fn default() -> Self {
        Self {
            pubsub: "https://pubsub.googleapis.com/v1".to_owned(),
            storage: "https://storage.googleapis.com/storage/v1".to_owned(),
            kms: "https://cloudkms.googleapis.com/v1".to_owned(),
            metadata: "http://metadata.google.internal/computeMetadata/v1".to_owned(),
        }
    }
}

/// Project, credentials and endpoints shared by every Google Cloud client.
#[derive(Clone, Serialize, Deserialize)]
pub struct GcpBaseConfig {
    pub project_id: String,

    /// Service account key file for the typed clients. Application Default
    /// Credentials apply when neither this nor `credentials_json` is set.
    #[serde(default)]
    pub credentials_path: Option<String>,

    /// Service account key given inline.
    #[serde(default)]
    pub credentials_json: Option<String>,

    /// Emulator address for the typed Pub/Sub and Cloud Storage clients.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Fixed bearer token for the REST clients. When unset, tokens are
    /// fetched from the metadata server.
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub rest: RestEndpoints,

    /// Upper bound for every remote call.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout_seconds() -> u64 {
    10
}

fn redact(secret: Option<&String>) -> Option<&'static str> {
    secret.map(|_| "<redacted>")
}

impl std::fmt::Debug for GcpBaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpBaseConfig")
            .field("project_id", &self.project_id)
            .field("credentials_path", &redact(self.credentials_path.as_ref()))
            .field("credentials_json", &redact(self.credentials_json.as_ref()))
            .field("endpoint_url", &self.endpoint_url)
            .field("access_token", &redact(self.access_token.as_ref()))
            .field("rest", &self.rest)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl GcpBaseConfig {
    /// Defaults for `project_id`: ADC credentials, production endpoints.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            credentials_path: None,
            credentials_json: None,
            endpoint_url: None,
            access_token: None,
            rest: RestEndpoints::default(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }

    /// Use a fixed bearer token for REST calls.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_rest_endpoints(mut self, rest: RestEndpoints) -> Self {
        self.rest = rest;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_for_project() {
        let config = GcpBaseConfig::new("drafts-prod");
        assert_eq!(config.project_id, "drafts-prod");
        assert!(config.access_token.is_none());
        assert_eq!(config.rest, RestEndpoints::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let mut config = GcpBaseConfig::new("p");
        config.request_timeout_seconds = 0;
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn secrets_are_hidden_from_debug() {
        let mut config = GcpBaseConfig::new("drafts-prod").with_access_token("ya29.secret");
        config.credentials_json = Some("{\"private_key\":\"k\"}".into());
        let rendered = format!("{config:?}");
        assert!(rendered.contains("drafts-prod"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("ya29"));
        assert!(!rendered.contains("private_key"));
    }

    #[test]
    fn emulator_overrides_keep_other_defaults() {
        let config: GcpBaseConfig = from_json(serde_json::json!({
            "project_id": "p",
            "endpoint_url": "http://localhost:8085",
            "rest": {"pubsub": "http://localhost:8085/v1"}
        }));
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:8085"));
        assert_eq!(config.rest.pubsub, "http://localhost:8085/v1");
        assert_eq!(config.rest.kms, RestEndpoints::default().kms);
        assert_eq!(config.request_timeout_seconds, 10);
    }

    fn from_json(value: serde_json::Value) -> GcpBaseConfig {
        serde_json::from_value(value).unwrap()
    }
}
