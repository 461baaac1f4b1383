use async_trait::async_trait;
use draftsync_core::{DraftRecord, FormType, SubjectId};
use uuid::Uuid;

use crate::error::StateError;

/// Result of inserting a new draft record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was staged.
    Inserted,
    /// An open record for the same `(subject, form type)` or the same draft
    /// id already exists; nothing was written.
    Conflict,
}

/// Transactional store of [`DraftRecord`]s.
///
/// Implementations enforce that at most one record per
/// `(subject_id, form_type)` has `done == false`.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Open a transaction. Changes become visible only after
    /// [`DraftTransaction::commit`]; dropping the transaction discards them.
    async fn begin(&self) -> Result<Box<dyn DraftTransaction>, StateError>;

    /// Number of records with `done == false`.
    async fn count_open(&self) -> Result<u64, StateError>;

    /// Open records for `(subject, form_type)`, read outside any caller
    /// transaction.
    async fn open_drafts(
        &self,
        subject: &SubjectId,
        form_type: FormType,
    ) -> Result<Vec<DraftRecord>, StateError> {
        let mut tx = self.begin().await?;
        let records = tx.find_open(subject, form_type).await?;
        tx.rollback().await?;
        Ok(records)
    }
}

/// A unit of work against a [`DraftStore`].
#[async_trait]
pub trait DraftTransaction: Send {
    async fn find_by_draft_id(&mut self, draft_id: Uuid) -> Result<Option<DraftRecord>, StateError>;

    /// Records with `done == false` for `(subject, form_type)`, oldest first.
    async fn find_open(
        &mut self,
        subject: &SubjectId,
        form_type: FormType,
    ) -> Result<Vec<DraftRecord>, StateError>;

    /// Insert a record unless it would violate uniqueness.
    async fn insert(&mut self, record: &DraftRecord) -> Result<InsertOutcome, StateError>;

    /// Flag an open record as updated and bump `updated_at`. Returns `false`
    /// when no open record has this id.
    async fn mark_updated(&mut self, draft_id: Uuid) -> Result<bool, StateError>;

    /// Flag a record as done. Returns `false` when no open record has this id.
    async fn mark_done(&mut self, draft_id: Uuid) -> Result<bool, StateError>;

    async fn commit(self: Box<Self>) -> Result<(), StateError>;

    async fn rollback(self: Box<Self>) -> Result<(), StateError>;
}
