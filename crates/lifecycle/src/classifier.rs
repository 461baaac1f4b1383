//! Storage-change notification classification.

use std::collections::HashMap;

use bytes::Bytes;
use draftsync_core::{
    DraftMetadata, EventKind, FormType, LifecycleTransition, StorageEvent, SubjectId,
};
use serde::Deserialize;
use tracing::trace;
use uuid::Uuid;

use crate::error::Unprocessable;

/// Notification attribute names set by Cloud Storage.
pub mod attributes {
    pub const EVENT_TYPE: &str = "eventType";
    pub const OBJECT_ID: &str = "objectId";
    pub const BUCKET_ID: &str = "bucketId";
    pub const OBJECT_GENERATION: &str = "objectGeneration";
    pub const OVERWRITTEN_BY_GENERATION: &str = "overwrittenByGeneration";
    pub const OVERWROTE_GENERATION: &str = "overwroteGeneration";
}

/// Custom object metadata keys identifying a draft.
pub mod metadata_keys {
    pub const FORM_TYPE: &str = "formType";
    pub const DRAFT_ID: &str = "draftId";
    pub const KEY_TEMPLATE: &str = "keyTemplate";
    pub const CONTENT_TYPE: &str = "contentType";
    pub const FILENAME: &str = "filename";
}

/// A message as delivered by the subscription: attributes plus body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub attributes: HashMap<String, String>,
    pub data: Bytes,
}

impl RawEvent {
    pub fn new(attributes: HashMap<String, String>, data: impl Into<Bytes>) -> Self {
        Self {
            attributes,
            data: data.into(),
        }
    }
}

/// A parsed event and, when it carries one, the draft it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub event: StorageEvent,
    /// Draft metadata, or why it could not be extracted. Only transitions
    /// that touch draft records require it.
    pub metadata: Result<DraftMetadata, Unprocessable>,
}

impl ClassifiedEvent {
    pub fn transition(&self) -> LifecycleTransition {
        self.event.transition()
    }
}

/// Strategy turning raw subscription messages into classified events.
pub trait EventClassifier: Send + Sync {
    /// Classify `raw`. Fails only when the event itself cannot be
    /// understood (missing or unknown event type, no object id); missing
    /// draft metadata is reported through [`ClassifiedEvent::metadata`].
    fn classify(&self, raw: &RawEvent) -> Result<ClassifiedEvent, Unprocessable>;
}

/// The `JSON_API_V1` notification payload: the object resource.
#[derive(Debug, Default, Deserialize)]
struct ObjectResource {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    bucket: Option<String>,
    #[serde(default)]
    generation: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Classifier for Cloud Storage Pub/Sub notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageNotificationClassifier;

impl StorageNotificationClassifier {
    fn payload(data: &[u8]) -> Result<ObjectResource, Unprocessable> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(ObjectResource::default());
        }
        serde_json::from_slice(data).map_err(|e| Unprocessable::InvalidPayload(e.to_string()))
    }
}

impl EventClassifier for StorageNotificationClassifier {
    fn classify(&self, raw: &RawEvent) -> Result<ClassifiedEvent, Unprocessable> {
        let attrs = &raw.attributes;
        let kind: EventKind = attrs
            .get(attributes::EVENT_TYPE)
            .ok_or(Unprocessable::MissingAttribute(attributes::EVENT_TYPE))?
            .parse()
            .map_err(|_| {
                Unprocessable::UnknownEventType(attrs[attributes::EVENT_TYPE].clone())
            })?;

        let payload = Self::payload(&raw.data);
        let resource = payload.as_ref().ok();

        let object_id = attrs
            .get(attributes::OBJECT_ID)
            .cloned()
            .or_else(|| resource.and_then(|r| r.name.clone()))
            .ok_or(Unprocessable::MissingAttribute(attributes::OBJECT_ID))?;

        let event = StorageEvent {
            object_id,
            bucket: attrs
                .get(attributes::BUCKET_ID)
                .cloned()
                .or_else(|| resource.and_then(|r| r.bucket.clone())),
            generation: attrs
                .get(attributes::OBJECT_GENERATION)
                .cloned()
                .or_else(|| resource.and_then(|r| r.generation.clone())),
            overwritten_by_generation: attrs.get(attributes::OVERWRITTEN_BY_GENERATION).cloned(),
            overwrote_generation: attrs.get(attributes::OVERWROTE_GENERATION).cloned(),
            kind,
            payload_metadata: resource.map(|r| r.metadata.clone()).unwrap_or_default(),
        };

        let metadata = match payload {
            Ok(_) => extract_metadata(&event),
            Err(e) => Err(e),
        };
        trace!(kind = %event.kind, transition = ?event.transition(), has_metadata = metadata.is_ok(), "classified storage event");

        Ok(ClassifiedEvent { event, metadata })
    }
}

/// Extract the draft identity: subject from the first object path segment,
/// form type and draft id from the object metadata.
pub fn extract_metadata(event: &StorageEvent) -> Result<DraftMetadata, Unprocessable> {
    let lookup = |key: &'static str| {
        event
            .payload_metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .ok_or(Unprocessable::MissingMetadata(key))
    };

    let form_type: FormType = lookup(metadata_keys::FORM_TYPE)?.parse().map_err(|e| {
        Unprocessable::InvalidMetadata {
            key: metadata_keys::FORM_TYPE,
            reason: format!("{e}"),
        }
    })?;
    let draft_id = Uuid::parse_str(lookup(metadata_keys::DRAFT_ID)?.trim()).map_err(|e| {
        Unprocessable::InvalidMetadata {
            key: metadata_keys::DRAFT_ID,
            reason: e.to_string(),
        }
    })?;
    let subject_id = event
        .subject_segment()
        .ok_or(Unprocessable::MissingMetadata("subject"))
        .and_then(|segment| {
            SubjectId::parse(segment).map_err(|e| Unprocessable::InvalidMetadata {
                key: "subject",
                reason: e.to_string(),
            })
        })?;

    Ok(DraftMetadata {
        subject_id,
        form_type,
        draft_id,
    })
}
