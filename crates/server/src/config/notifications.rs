use draftsync_lifecycle::NotificationSettings;
use serde::Deserialize;

/// Outgoing notification configuration.
#[derive(Debug, Deserialize)]
pub struct NotificationsConfig {
    /// Content and routing settings shared with the dispatcher.
    #[serde(flatten)]
    pub settings: NotificationSettings,
    /// When `false`, records are kept but messages are only logged.
    #[serde(default = "default_true")]
    pub send_enabled: bool,
    /// Short name of the topic notifications are published to.
    pub topic: Option<String>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            settings: NotificationSettings::default(),
            send_enabled: true,
            topic: None,
        }
    }
}

fn default_true() -> bool {
    true
}
