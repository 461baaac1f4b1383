use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// Number of leading characters left visible when a subject id is printed.
const VISIBLE_PREFIX: usize = 6;

/// Pseudonymized personal identifier of the citizen owning a draft.
///
/// The raw value is only reachable through [`SubjectId::expose`]. `Debug` and
/// `Display` mask everything after the first six characters so the value can
/// be passed to `tracing` fields without leaking the full identifier.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Parse a subject id. Empty values and values containing `/` are
    /// rejected since the id is used as the first object-path segment.
    pub fn parse(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains('/') {
            return Err(CoreError::InvalidSubject);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The unmasked identifier.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Stable, non-reversible digest used where an identifier is needed but
    /// the raw value must not leave the process (ordering keys, metrics).
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..8])
    }

    fn masked(&self) -> String {
        let visible: String = self.0.chars().take(VISIBLE_PREFIX).collect();
        format!("{visible}*****")
    }
}

impl fmt::Debug for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SubjectId").field(&self.masked()).finish()
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_masks_tail() {
        let id = SubjectId::parse("01017012345").unwrap();
        assert_eq!(id.to_string(), "010170*****");
        assert!(!format!("{id:?}").contains("12345"));
        assert_eq!(id.expose(), "01017012345");
    }

    #[test]
    fn rejects_empty_and_path_values() {
        assert_eq!(SubjectId::parse("  "), Err(CoreError::InvalidSubject));
        assert_eq!(SubjectId::parse("a/b"), Err(CoreError::InvalidSubject));
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = SubjectId::parse("01017012345").unwrap();
        let b = SubjectId::parse("01017012345").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
        assert!(!a.fingerprint().contains("01017012345"));
    }

    #[test]
    fn serializes_transparently() {
        let id = SubjectId::parse("01017012345").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"01017012345\"");
    }
}
