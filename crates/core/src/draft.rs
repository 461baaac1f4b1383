use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::form::FormType;
use crate::notification::ItemKind;
use crate::subject::SubjectId;

/// Whether the draft notification is still as first created or has been
/// refreshed since.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DraftKind {
    Created,
    Updated,
}

impl DraftKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
        }
    }

    /// Parse the persisted column value.
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "CREATED" => Some(Self::Created),
            "UPDATED" => Some(Self::Updated),
            _ => None,
        }
    }
}

/// Local bookkeeping row tracking the notification state of one draft.
///
/// At most one row per `(subject_id, form_type)` has `done == false`. Closing
/// a draft flips `done` instead of deleting the row so the audit trail
/// survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub subject_id: SubjectId,
    pub form_type: FormType,
    pub draft_id: Uuid,
    pub kind: DraftKind,
    /// What the notification was announced as, so it is closed in kind.
    #[serde(default)]
    pub item: ItemKind,
    pub done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DraftRecord {
    /// A freshly created, open record.
    pub fn created(subject_id: SubjectId, form_type: FormType, draft_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            subject_id,
            form_type,
            draft_id,
            kind: DraftKind::Created,
            item: ItemKind::Message,
            done: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// A record that is closed from the start. Stored when a draft is deleted
    /// before its creation was recorded, so a late creation is recognised.
    pub fn closed(subject_id: SubjectId, form_type: FormType, draft_id: Uuid) -> Self {
        Self {
            done: true,
            ..Self::created(subject_id, form_type, draft_id)
        }
    }

    pub fn announced_as(mut self, item: ItemKind) -> Self {
        self.item = item;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_record_is_open() {
        let record = DraftRecord::created(
            SubjectId::parse("01017012345").unwrap(),
            FormType::Standard,
            Uuid::new_v4(),
        );
        assert_eq!(record.kind, DraftKind::Created);
        assert!(!record.done);
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.item, ItemKind::Message);
    }

    #[test]
    fn closed_record_keeps_identity() {
        let draft_id = Uuid::new_v4();
        let record = DraftRecord::closed(
            SubjectId::parse("01017012345").unwrap(),
            FormType::Abroad,
            draft_id,
        )
        .announced_as(ItemKind::Task);
        assert!(record.done);
        assert_eq!(record.draft_id, draft_id);
        assert_eq!(record.item, ItemKind::Task);
    }

    #[test]
    fn kind_db_values() {
        assert_eq!(DraftKind::from_db("UPDATED"), Some(DraftKind::Updated));
        assert_eq!(DraftKind::from_db(DraftKind::Created.as_str()), Some(DraftKind::Created));
        assert_eq!(DraftKind::from_db("DONE"), None);
    }
}
