mod attachments;
mod bucket;
mod kms;
mod notifications;
mod server;
mod state;
mod telemetry;


pub use attachments::*;
pub use bucket::*;
pub use kms::*;
pub use notifications::*;
pub use server::*;
pub use state::*;
pub use telemetry::*;

use std::path::Path;

use draftsync_gcp::GcpBaseConfig;
use draftsync_lifecycle::SubscriberSettings;
use serde::Deserialize;

use crate::error::ServerError;

/// Top-level configuration, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct DraftsyncConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Google Cloud project and credentials. When absent the service runs
    /// locally: in-memory objects, logged notifications, no subscriber.
    #[serde(default)]
    pub gcp: Option<GcpBaseConfig>,
    /// Draft bucket and its event delivery.
    #[serde(default)]
    pub bucket: BucketSection,
    /// Envelope encryption key.
    #[serde(default)]
    pub kms: KmsConfig,
    /// Draft record store.
    #[serde(default)]
    pub state: StateConfig,
    /// Uploaded attachments.
    #[serde(default)]
    pub attachments: AttachmentsConfig,
    /// Outgoing notifications.
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Subscription pull loops.
    #[serde(default)]
    pub subscriber: SubscriberSettings,
    /// Log output.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl DraftsyncConfig {
    /// Parse a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self, ServerError> {
        toml::from_str(contents).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Load `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        if path.exists() {
            Self::from_toml(&std::fs::read_to_string(path)?)
        } else {
            Self::from_toml("")
        }
    }

    /// The GCP project, when running against Google Cloud.
    pub fn project_id(&self) -> Option<&str> {
        self.gcp.as_ref().map(|g| g.project_id.as_str())
    }
}
