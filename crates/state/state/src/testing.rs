use draftsync_core::{DraftKind, DraftRecord, FormType, ItemKind, SubjectId};
use uuid::Uuid;

use crate::error::StateError;
use crate::store::{DraftStore, InsertOutcome};

fn fresh_subject() -> SubjectId {
    let digits: String = Uuid::new_v4()
        .as_u128()
        .to_string()
        .chars()
        .take(11)
        .collect();
    SubjectId::parse(digits).expect("generated subject is valid")
}

/// Run the full draft store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
/// Every test uses its own random subject, so the suite tolerates a store
/// shared with other data.
///
/// # Errors
///
/// Returns an error if the backend fails; assertion failures panic.
pub async fn run_store_conformance_tests(store: &dyn DraftStore) -> Result<(), StateError> {
    test_insert_and_commit(store).await?;
    test_rollback_discards(store).await?;
    test_open_pair_is_unique(store).await?;
    test_duplicate_draft_id_conflicts(store).await?;
    test_mark_updated(store).await?;
    test_mark_done_reopens_pair(store).await?;
    test_forms_are_independent(store).await?;
    test_count_open(store).await?;
    test_closed_record_blocks_draft_id(store).await?;
    Ok(())
}

async fn test_insert_and_commit(store: &dyn DraftStore) -> Result<(), StateError> {
    let record = DraftRecord::created(fresh_subject(), FormType::Standard, Uuid::new_v4());
    let mut tx = store.begin().await?;
    assert_eq!(tx.insert(&record).await?, InsertOutcome::Inserted);
    tx.commit().await?;

    let mut tx = store.begin().await?;
    let found = tx.find_by_draft_id(record.draft_id).await?;
    tx.rollback().await?;
    let found = found.expect("committed record should be readable");
    assert_eq!(found.subject_id, record.subject_id);
    assert_eq!(found.form_type, FormType::Standard);
    assert_eq!(found.kind, DraftKind::Created);
    assert!(!found.done);
    Ok(())
}

async fn test_rollback_discards(store: &dyn DraftStore) -> Result<(), StateError> {
    let record = DraftRecord::created(fresh_subject(), FormType::Standard, Uuid::new_v4());
    let mut tx = store.begin().await?;
    tx.insert(&record).await?;
    tx.rollback().await?;

    let open = store
        .open_drafts(&record.subject_id, record.form_type)
        .await?;
    assert!(open.is_empty(), "rolled back insert must not be visible");
    Ok(())
}

async fn test_open_pair_is_unique(store: &dyn DraftStore) -> Result<(), StateError> {
    let subject = fresh_subject();
    let first = DraftRecord::created(subject.clone(), FormType::Abroad, Uuid::new_v4());
    let second = DraftRecord::created(subject.clone(), FormType::Abroad, Uuid::new_v4());

    let mut tx = store.begin().await?;
    assert_eq!(tx.insert(&first).await?, InsertOutcome::Inserted);
    tx.commit().await?;

    let mut tx = store.begin().await?;
    assert_eq!(
        tx.insert(&second).await?,
        InsertOutcome::Conflict,
        "second open record for the same pair must conflict"
    );
    tx.commit().await?;

    let open = store.open_drafts(&subject, FormType::Abroad).await?;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].draft_id, first.draft_id);
    Ok(())
}

async fn test_duplicate_draft_id_conflicts(store: &dyn DraftStore) -> Result<(), StateError> {
    let record = DraftRecord::created(fresh_subject(), FormType::Standard, Uuid::new_v4());
    let mut tx = store.begin().await?;
    tx.insert(&record).await?;
    assert!(tx.mark_done(record.draft_id).await?);
    tx.commit().await?;

    let mut tx = store.begin().await?;
    assert_eq!(tx.insert(&record).await?, InsertOutcome::Conflict);
    tx.rollback().await?;
    Ok(())
}

async fn test_mark_updated(store: &dyn DraftStore) -> Result<(), StateError> {
    let record = DraftRecord::created(fresh_subject(), FormType::Standard, Uuid::new_v4());
    let mut tx = store.begin().await?;
    tx.insert(&record).await?;
    tx.commit().await?;

    let mut tx = store.begin().await?;
    assert!(tx.mark_updated(record.draft_id).await?);
    assert!(!tx.mark_updated(Uuid::new_v4()).await?);
    tx.commit().await?;

    let open = store
        .open_drafts(&record.subject_id, record.form_type)
        .await?;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].kind, DraftKind::Updated);
    assert!(open[0].updated_at >= open[0].created_at);
    Ok(())
}

async fn test_mark_done_reopens_pair(store: &dyn DraftStore) -> Result<(), StateError> {
    let subject = fresh_subject();
    let first = DraftRecord::created(subject.clone(), FormType::Standard, Uuid::new_v4());
    let mut tx = store.begin().await?;
    tx.insert(&first).await?;
    tx.commit().await?;

    let mut tx = store.begin().await?;
    assert!(tx.mark_done(first.draft_id).await?);
    assert!(
        !tx.mark_done(first.draft_id).await?,
        "closing a done record is a no-op"
    );
    assert!(
        !tx.mark_updated(first.draft_id).await?,
        "done records are never updated"
    );
    tx.commit().await?;

    let second = DraftRecord::created(subject.clone(), FormType::Standard, Uuid::new_v4());
    let mut tx = store.begin().await?;
    assert_eq!(tx.insert(&second).await?, InsertOutcome::Inserted);
    tx.commit().await?;

    let mut tx = store.begin().await?;
    let closed = tx.find_by_draft_id(first.draft_id).await?;
    tx.rollback().await?;
    assert!(closed.is_some_and(|r| r.done), "closed record is kept");
    Ok(())
}

async fn test_forms_are_independent(store: &dyn DraftStore) -> Result<(), StateError> {
    let subject = fresh_subject();
    let standard = DraftRecord::created(subject.clone(), FormType::Standard, Uuid::new_v4());
    let abroad = DraftRecord::created(subject.clone(), FormType::Abroad, Uuid::new_v4());
    let mut tx = store.begin().await?;
    assert_eq!(tx.insert(&standard).await?, InsertOutcome::Inserted);
    assert_eq!(tx.insert(&abroad).await?, InsertOutcome::Inserted);
    tx.commit().await?;

    assert_eq!(store.open_drafts(&subject, FormType::Standard).await?.len(), 1);
    assert_eq!(store.open_drafts(&subject, FormType::Abroad).await?.len(), 1);
    Ok(())
}

async fn test_count_open(store: &dyn DraftStore) -> Result<(), StateError> {
    let before = store.count_open().await?;
    let record = DraftRecord::created(fresh_subject(), FormType::Standard, Uuid::new_v4());
    let mut tx = store.begin().await?;
    tx.insert(&record).await?;
    tx.commit().await?;
    assert!(store.count_open().await? >= before + 1);

    let mut tx = store.begin().await?;
    tx.mark_done(record.draft_id).await?;
    tx.commit().await?;
    let open = store
        .open_drafts(&record.subject_id, record.form_type)
        .await?;
    assert!(open.is_empty());
    Ok(())
}

async fn test_closed_record_blocks_draft_id(store: &dyn DraftStore) -> Result<(), StateError> {
    let subject = fresh_subject();
    let closed = DraftRecord::closed(subject.clone(), FormType::Abroad, Uuid::new_v4())
        .announced_as(ItemKind::Task);
    let mut tx = store.begin().await?;
    assert_eq!(tx.insert(&closed).await?, InsertOutcome::Inserted);
    tx.commit().await?;

    let mut tx = store.begin().await?;
    let found = tx.find_by_draft_id(closed.draft_id).await?;
    let late = DraftRecord::created(subject.clone(), FormType::Abroad, closed.draft_id);
    let outcome = tx.insert(&late).await?;
    tx.rollback().await?;
    let found = found.expect("closed record should be readable");
    assert!(found.done);
    assert_eq!(found.item, ItemKind::Task);
    assert_eq!(outcome, InsertOutcome::Conflict);
    assert!(store.open_drafts(&subject, FormType::Abroad).await?.is_empty());
    Ok(())
}
