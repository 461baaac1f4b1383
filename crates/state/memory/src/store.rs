use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use draftsync_core::{DraftKind, DraftRecord, FormType, SubjectId};
use draftsync_state::{DraftStore, DraftTransaction, InsertOutcome, StateError};

type Records = HashMap<Uuid, DraftRecord>;

/// In-memory implementation of [`DraftStore`].
///
/// Transactions are serialized: [`DraftStore::begin`] takes an exclusive
/// lock and works on a private copy of the records, which replaces the
/// shared copy on commit. Suitable for development and tests.
#[derive(Default, Clone)]
pub struct MemoryDraftStore {
    records: Arc<Mutex<Records>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record, open or done, for assertions in tests.
    pub async fn snapshot(&self) -> Vec<DraftRecord> {
        let mut records: Vec<_> = self.records.lock().await.values().cloned().collect();
        records.sort_by_key(|r| r.created_at);
        records
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn begin(&self) -> Result<Box<dyn DraftTransaction>, StateError> {
        let guard = Arc::clone(&self.records).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryDraftTransaction { guard, working }))
    }

    async fn count_open(&self) -> Result<u64, StateError> {
        let records = self.records.lock().await;
        Ok(records.values().filter(|r| !r.done).count() as u64)
    }
}

struct MemoryDraftTransaction {
    guard: OwnedMutexGuard<Records>,
    working: Records,
}

impl MemoryDraftTransaction {
    fn open_mut(&mut self, draft_id: Uuid) -> Option<&mut DraftRecord> {
        self.working.get_mut(&draft_id).filter(|r| !r.done)
    }
}

#[async_trait]
impl DraftTransaction for MemoryDraftTransaction {
    async fn find_by_draft_id(&mut self, draft_id: Uuid) -> Result<Option<DraftRecord>, StateError> {
        Ok(self.working.get(&draft_id).cloned())
    }

    async fn find_open(
        &mut self,
        subject: &SubjectId,
        form_type: FormType,
    ) -> Result<Vec<DraftRecord>, StateError> {
        let mut open: Vec<_> = self
            .working
            .values()
            .filter(|r| !r.done && r.form_type == form_type && &r.subject_id == subject)
            .cloned()
            .collect();
        open.sort_by_key(|r| r.created_at);
        Ok(open)
    }

    async fn insert(&mut self, record: &DraftRecord) -> Result<InsertOutcome, StateError> {
        let clashes = self.working.contains_key(&record.draft_id)
            || (!record.done
                && self.working.values().any(|r| {
                    !r.done && r.form_type == record.form_type && r.subject_id == record.subject_id
                }));
        if clashes {
            return Ok(InsertOutcome::Conflict);
        }
        self.working.insert(record.draft_id, record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn mark_updated(&mut self, draft_id: Uuid) -> Result<bool, StateError> {
        let Some(record) = self.open_mut(draft_id) else {
            return Ok(false);
        };
        record.kind = DraftKind::Updated;
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn mark_done(&mut self, draft_id: Uuid) -> Result<bool, StateError> {
        let Some(record) = self.open_mut(draft_id) else {
            return Ok(false);
        };
        record.done = true;
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StateError> {
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StateError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> SubjectId {
        SubjectId::parse("01017012345").unwrap()
    }

    #[tokio::test]
    async fn conformance() {
        let store = MemoryDraftStore::new();
        draftsync_state::testing::run_store_conformance_tests(&store)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn dropped_transaction_discards_changes() {
        let store = MemoryDraftStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert(&DraftRecord::created(subject(), FormType::Standard, Uuid::new_v4()))
                .await
                .unwrap();
        }
        assert!(store.snapshot().await.is_empty());
        assert_eq!(store.count_open().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn transactions_are_serialized() {
        let store = MemoryDraftStore::new();
        let mut first = store.begin().await.unwrap();
        first
            .insert(&DraftRecord::created(subject(), FormType::Standard, Uuid::new_v4()))
            .await
            .unwrap();

        let contender = store.clone();
        let second = tokio::spawn(async move {
            let mut tx = contender.begin().await.unwrap();
            let outcome = tx
                .insert(&DraftRecord::created(subject(), FormType::Standard, Uuid::new_v4()))
                .await
                .unwrap();
            tx.commit().await.unwrap();
            outcome
        });

        tokio::task::yield_now().await;
        first.commit().await.unwrap();
        assert_eq!(second.await.unwrap(), InsertOutcome::Conflict);
        assert_eq!(store.count_open().await.unwrap(), 1);
    }
}
