use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::form::FormType;
use crate::subject::SubjectId;

/// Identifier of a stored blob, relative to its owning subject.
///
/// Drafts use the form type wire name so each subject has at most one draft
/// per form; attachments use a random UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        if raw.is_empty() || raw.contains('/') {
            return Err(CoreError::InvalidBlobId(raw));
        }
        Ok(Self(raw))
    }

    /// A fresh attachment id.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The blob id of a subject's draft for `form_type`.
    pub fn for_form(form_type: FormType) -> Self {
        Self(form_type.as_str().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Object name for a subject's blob: `<subject>/<blob id>`.
///
/// The subject is the first path segment, which is how storage events are
/// traced back to their owner.
pub fn object_key(subject: &SubjectId, blob: &BlobId) -> String {
    format!("{}/{}", subject.expose(), blob.as_str())
}
