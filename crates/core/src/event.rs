use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::form::FormType;
use crate::subject::SubjectId;

/// The storage mutation a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A new object version was successfully written.
    Finalize,
    /// An object version was removed.
    Delete,
}

impl EventKind {
    /// Wire name as sent by Cloud Storage in the `eventType` attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Finalize => "OBJECT_FINALIZE",
            Self::Delete => "OBJECT_DELETE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = CoreError;

    /// Accepts the storage wire names and their short forms. Metadata
    /// updates and archive events are deliberately not recognised.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "OBJECT_FINALIZE" | "FINALIZE" => Ok(Self::Finalize),
            "OBJECT_DELETE" | "DELETE" => Ok(Self::Delete),
            other => Err(CoreError::UnknownEventType(other.to_owned())),
        }
    }
}

/// A storage-change notification after attribute parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
    /// Full object name, `<subject>/<form type or blob id>`.
    pub object_id: String,
    /// Bucket the object lives in, when the notification names it.
    pub bucket: Option<String>,
    /// Generation of the object version this event is about.
    pub generation: Option<String>,
    /// Set on a delete that happened because a newer generation was written.
    pub overwritten_by_generation: Option<String>,
    /// Set on a finalize that replaced an existing generation.
    pub overwrote_generation: Option<String>,
    /// Finalize or delete.
    pub kind: EventKind,
    /// Custom object metadata carried in the notification payload.
    #[serde(default)]
    pub payload_metadata: HashMap<String, String>,
}

impl StorageEvent {
    /// `true` when this finalize replaced an earlier version (an update).
    pub fn is_overwrite(&self) -> bool {
        self.overwrote_generation.is_some()
    }

    /// `true` when this delete is the automatic removal of a superseded
    /// version rather than an explicit discard or expiry.
    pub fn is_version_replacement_delete(&self) -> bool {
        self.overwritten_by_generation.is_some()
    }

    /// First path segment of the object id, the owning subject.
    pub fn subject_segment(&self) -> Option<&str> {
        self.object_id
            .split('/')
            .next()
            .filter(|segment| !segment.is_empty())
    }

    /// The lifecycle transition this event represents.
    pub fn transition(&self) -> LifecycleTransition {
        match self.kind {
            EventKind::Finalize if self.is_overwrite() => LifecycleTransition::Update,
            EventKind::Finalize => LifecycleTransition::FirstCreation,
            EventKind::Delete if self.is_version_replacement_delete() => {
                LifecycleTransition::VersionReplacement
            }
            EventKind::Delete => LifecycleTransition::TerminalDeletion,
        }
    }
}

/// How a classified event moves a draft through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleTransition {
    /// First finalize for a draft: create the notification.
    FirstCreation,
    /// Finalize over an existing version: refresh the notification.
    Update,
    /// Explicit discard or expiry: close every open notification.
    TerminalDeletion,
    /// Delete caused by an overwrite: nothing to do.
    VersionReplacement,
}

/// Structured metadata identifying the draft an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftMetadata {
    pub subject_id: SubjectId,
    pub form_type: FormType,
    pub draft_id: Uuid,
}
