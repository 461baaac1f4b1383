use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::subject::SubjectId;

/// Identity of a user-facing notification in the downstream messaging
/// system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationKey {
    pub subject_id: SubjectId,
    /// Identity of the notification; the draft id for draft notifications.
    pub event_id: Uuid,
    /// Groups related notifications, the form type wire name.
    pub grouping_id: String,
    pub app: String,
    pub namespace: String,
}

impl NotificationKey {
    /// Deterministic ordering key so every publish for the same logical
    /// notification lands on the same partition, in order.
    ///
    /// The subject is included as a fingerprint, never in clear text.
    pub fn ordering_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.namespace,
            self.app,
            self.grouping_id,
            self.subject_id.fingerprint(),
            self.event_id
        )
    }
}

/// What kind of user-facing item a message creates or closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// Informational message (beskjed).
    Message,
    /// Actionable task (oppgave).
    Task,
    /// Closes a previously published message or task.
    Done,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "MESSAGE",
            Self::Task => "TASK",
            Self::Done => "DONE",
        }
    }
}

/// The user-facing item a draft is announced as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    #[default]
    Message,
    Task,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        self.notification_kind().as_str()
    }

    /// Parse the persisted column value.
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "MESSAGE" => Some(Self::Message),
            "TASK" => Some(Self::Task),
            _ => None,
        }
    }

    /// The notification kind that creates an item of this kind.
    pub fn notification_kind(self) -> NotificationKind {
        match self {
            Self::Message => NotificationKind::Message,
            Self::Task => NotificationKind::Task,
        }
    }
}

/// A keyed notification published to the downstream messaging system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub key: NotificationKey,
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub security_level: u8,
    #[serde(default)]
    pub external_alert: bool,
    #[serde(default)]
    pub preferred_channels: Vec<String>,
}

impl NotificationMessage {
    /// A `DONE` message closing whatever notification `key` identifies.
    pub fn done(key: NotificationKey) -> Self {
        Self {
            key,
            kind: NotificationKind::Done,
            text: None,
            timestamp: Utc::now(),
            visible_until: None,
            link: None,
            security_level: 0,
            external_alert: false,
            preferred_channels: Vec::new(),
        }
    }
}
