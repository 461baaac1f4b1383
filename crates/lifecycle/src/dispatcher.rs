//! Publishes draft notifications and keeps the local draft records in step.
//!
//! Every operation runs inside one [`DraftTransaction`]: the message is
//! published first, then the record mutation is staged and committed. A
//! failed publish rolls the transaction back without touching state; a
//! failed commit after a successful publish surfaces as
//! [`LifecycleError::Persistence`] and the already published message is
//! left for consumers to deduplicate on the draft id.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use draftsync_core::{
    DraftMetadata, DraftRecord, FormType, ItemKind, NotificationKey, NotificationMessage, SubjectId,
};
use draftsync_provider::DynPublisher;
use draftsync_state::{DraftStore, DraftTransaction, InsertOutcome};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{LifecycleError, bounded};
use crate::metrics::LifecycleMetrics;

/// Content and routing settings for outgoing notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// When `false`, every operation is logged and skipped.
    pub enabled: bool,
    /// Producing application, part of every notification key.
    pub app: String,
    /// Owning namespace, part of every notification key.
    pub namespace: String,
    /// Base URL of the form application; the form type is appended.
    pub link: Option<String>,
    /// Item new drafts are announced as.
    pub announce_as: ItemKind,
    pub message: ItemSettings,
    pub task: ItemSettings,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            app: "draftsync".to_owned(),
            namespace: "drafts".to_owned(),
            link: None,
            announce_as: ItemKind::Message,
            message: ItemSettings::default(),
            task: ItemSettings {
                visibility_days: 90,
                ..ItemSettings::default()
            },
        }
    }
}

impl NotificationSettings {
    pub fn item(&self, kind: ItemKind) -> &ItemSettings {
        match kind {
            ItemKind::Message => &self.message,
            ItemKind::Task => &self.task,
        }
    }

    fn link_for(&self, form_type: FormType) -> Option<String> {
        self.link.as_ref().map(|base| {
            format!(
                "{}/{}",
                base.trim_end_matches('/'),
                form_type.as_str().to_ascii_lowercase()
            )
        })
    }
}

/// Settings for one kind of user-facing item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemSettings {
    /// When `false`, items of this kind are neither announced nor closed
    /// downstream. Local records are still closed.
    pub enabled: bool,
    /// How long an announced item stays visible.
    pub visibility_days: u32,
    pub security_level: u8,
    /// Preferred external alert channels, e.g. `SMS`, `EPOST`.
    pub channels: Vec<String>,
}

impl Default for ItemSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            visibility_days: 28,
            security_level: 3,
            channels: Vec::new(),
        }
    }
}

/// Why a well-formed operation ended without a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A record with this draft id already exists, open or done.
    AlreadyKnown,
    /// Another draft of the same form is already open for the subject.
    AlreadyOpen,
    /// A concurrent create won the uniqueness race.
    RaceLost,
    /// No open record to update or close.
    NoOpenDraft,
}

/// Result of a dispatcher operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Created,
    Updated,
    /// Number of records closed.
    Closed(usize),
    Skipped(SkipReason),
    /// Notifications are switched off.
    Disabled,
}

/// Publishes create, update and close notifications for drafts.
pub struct NotificationDispatcher {
    store: Arc<dyn DraftStore>,
    publisher: Arc<dyn DynPublisher>,
    settings: NotificationSettings,
    metrics: Arc<LifecycleMetrics>,
    call_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn DraftStore>,
        publisher: Arc<dyn DynPublisher>,
        settings: NotificationSettings,
        metrics: Arc<LifecycleMetrics>,
    ) -> Self {
        Self {
            store,
            publisher,
            settings,
            metrics,
            call_timeout: Duration::from_secs(10),
        }
    }

    /// Bound applied to every publish call.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn settings(&self) -> &NotificationSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn DraftStore> {
        &self.store
    }

    /// Announce a newly started draft, unless the draft is already known or
    /// another draft of the same form is open.
    #[instrument(skip(self, metadata), fields(form_type = %metadata.form_type, draft_id = %metadata.draft_id))]
    pub async fn create(&self, metadata: &DraftMetadata) -> Result<DispatchOutcome, LifecycleError> {
        let item = self.settings.announce_as;
        if !self.settings.enabled || !self.settings.item(item).enabled {
            info!(item = item.as_str(), "notifications disabled, not announcing draft");
            return Ok(DispatchOutcome::Disabled);
        }
        let mut tx = self.store.begin().await?;
        let result = self.create_in(tx.as_mut(), metadata).await;
        self.finish(tx, result).await
    }

    /// Refresh the open notification for `(subject, form_type)`.
    #[instrument(skip(self, subject), fields(subject = %subject, form_type = %form_type))]
    pub async fn update(
        &self,
        subject: &SubjectId,
        form_type: FormType,
    ) -> Result<DispatchOutcome, LifecycleError> {
        if !self.settings.enabled {
            info!("notifications disabled, not refreshing draft");
            return Ok(DispatchOutcome::Disabled);
        }
        let mut tx = self.store.begin().await?;
        let result = self.update_in(tx.as_mut(), subject, form_type).await;
        self.finish(tx, result).await
    }

    /// Close every open notification for the draft's `(subject, form_type)`.
    ///
    /// When nothing is open and the draft itself was never recorded, a closed
    /// record is stored for it so a creation redelivered after the delete is
    /// recognised as already known.
    #[instrument(skip(self, metadata), fields(form_type = %metadata.form_type, draft_id = %metadata.draft_id))]
    pub async fn close(&self, metadata: &DraftMetadata) -> Result<DispatchOutcome, LifecycleError> {
        if !self.settings.enabled {
            info!("notifications disabled, not closing draft");
            return Ok(DispatchOutcome::Disabled);
        }
        let mut tx = self.store.begin().await?;
        let result = self.close_in(tx.as_mut(), metadata).await;
        self.finish(tx, result).await
    }

    /// Commit on success, roll back on failure.
    async fn finish(
        &self,
        tx: Box<dyn DraftTransaction>,
        result: Result<DispatchOutcome, LifecycleError>,
    ) -> Result<DispatchOutcome, LifecycleError> {
        match result {
            Ok(outcome) => {
                tx.commit().await?;
                if !matches!(outcome, DispatchOutcome::Skipped(_)) {
                    self.refresh_open_gauge().await;
                }
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn create_in(
        &self,
        tx: &mut dyn DraftTransaction,
        metadata: &DraftMetadata,
    ) -> Result<DispatchOutcome, LifecycleError> {
        if let Some(existing) = tx.find_by_draft_id(metadata.draft_id).await? {
            debug!(done = existing.done, "draft already recorded");
            return Ok(DispatchOutcome::Skipped(SkipReason::AlreadyKnown));
        }
        let open = tx.find_open(&metadata.subject_id, metadata.form_type).await?;
        if !open.is_empty() {
            debug!(open = open.len(), "another draft of this form is open");
            return Ok(DispatchOutcome::Skipped(SkipReason::AlreadyOpen));
        }

        let item = self.settings.announce_as;
        let message = self.draft_message(
            &metadata.subject_id,
            metadata.form_type,
            metadata.draft_id,
            item,
        );
        self.publish(&message).await?;

        let record = DraftRecord::created(
            metadata.subject_id.clone(),
            metadata.form_type,
            metadata.draft_id,
        )
        .announced_as(item);
        match tx.insert(&record).await? {
            InsertOutcome::Inserted => {
                info!("draft notification created");
                Ok(DispatchOutcome::Created)
            }
            InsertOutcome::Conflict => {
                warn!("concurrent create won, keeping the existing record");
                Ok(DispatchOutcome::Skipped(SkipReason::RaceLost))
            }
        }
    }

    async fn update_in(
        &self,
        tx: &mut dyn DraftTransaction,
        subject: &SubjectId,
        form_type: FormType,
    ) -> Result<DispatchOutcome, LifecycleError> {
        let open = tx.find_open(subject, form_type).await?;
        let Some(record) = open.first() else {
            warn!("no open draft to update");
            return Ok(DispatchOutcome::Skipped(SkipReason::NoOpenDraft));
        };

        if self.settings.item(record.item).enabled {
            let message = self.draft_message(subject, form_type, record.draft_id, record.item);
            self.publish(&message).await?;
        } else {
            info!(item = record.item.as_str(), "item kind disabled, refreshing record only");
        }

        if tx.mark_updated(record.draft_id).await? {
            info!(draft_id = %record.draft_id, "draft notification refreshed");
            Ok(DispatchOutcome::Updated)
        } else {
            Ok(DispatchOutcome::Skipped(SkipReason::NoOpenDraft))
        }
    }

    async fn close_in(
        &self,
        tx: &mut dyn DraftTransaction,
        metadata: &DraftMetadata,
    ) -> Result<DispatchOutcome, LifecycleError> {
        let (subject, form_type) = (&metadata.subject_id, metadata.form_type);
        let open = tx.find_open(subject, form_type).await?;
        if open.is_empty() {
            if tx.find_by_draft_id(metadata.draft_id).await?.is_none() {
                let record = DraftRecord::closed(subject.clone(), form_type, metadata.draft_id)
                    .announced_as(self.settings.announce_as);
                tx.insert(&record).await?;
                debug!("draft deleted before it was recorded, stored it as closed");
            } else {
                debug!("no open draft to close");
            }
            return Ok(DispatchOutcome::Skipped(SkipReason::NoOpenDraft));
        }

        let mut closed = 0;
        for record in &open {
            if self.settings.item(record.item).enabled {
                let key = self.key(subject, form_type, record.draft_id);
                self.publish(&NotificationMessage::done(key)).await?;
            } else {
                info!(item = record.item.as_str(), draft_id = %record.draft_id, "item kind disabled, closing record only");
            }
            if tx.mark_done(record.draft_id).await? {
                closed += 1;
            }
        }
        info!(closed, "draft notifications closed");
        Ok(DispatchOutcome::Closed(closed))
    }

    async fn publish(&self, message: &NotificationMessage) -> Result<String, LifecycleError> {
        let id = bounded("publish", self.call_timeout, self.publisher.publish(message))
            .await?
            .map_err(LifecycleError::Publish)?;
        self.metrics.increment_published();
        debug!(publisher = self.publisher.name(), message_id = %id, kind = message.kind.as_str(), "notification published");
        Ok(id)
    }

    async fn refresh_open_gauge(&self) {
        match self.store.count_open().await {
            Ok(count) => self.metrics.set_open_drafts(count),
            Err(e) => warn!(error = %e, "failed to count open drafts"),
        }
    }

    fn key(&self, subject: &SubjectId, form_type: FormType, draft_id: Uuid) -> NotificationKey {
        NotificationKey {
            subject_id: subject.clone(),
            event_id: draft_id,
            grouping_id: form_type.as_str().to_owned(),
            app: self.settings.app.clone(),
            namespace: self.settings.namespace.clone(),
        }
    }

    fn draft_message(
        &self,
        subject: &SubjectId,
        form_type: FormType,
        draft_id: Uuid,
        item: ItemKind,
    ) -> NotificationMessage {
        let settings = self.settings.item(item);
        let now = Utc::now();
        NotificationMessage {
            key: self.key(subject, form_type, draft_id),
            kind: item.notification_kind(),
            text: Some(format!("You have an unfinished {}", form_type.title())),
            timestamp: now,
            visible_until: Some(now + chrono::Duration::days(i64::from(settings.visibility_days))),
            link: self.settings.link_for(form_type),
            security_level: settings.security_level,
            external_alert: !settings.channels.is_empty(),
            preferred_channels: settings.channels.clone(),
        }
    }
}
