//! Drives draft notifications from classified storage events.

use std::sync::Arc;

use draftsync_core::{BucketTopology, LifecycleTransition};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::classifier::{ClassifiedEvent, EventClassifier, RawEvent};
use crate::dispatcher::{DispatchOutcome, NotificationDispatcher};
use crate::error::{Disposition, LifecycleError};
use crate::metrics::LifecycleMetrics;

/// What reconciling one event amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The dispatcher acted (or deliberately did not).
    Dispatched(DispatchOutcome),
    /// A delete caused by an overwrite; nothing to do.
    Suppressed,
    /// The event belongs to a bucket this reconciler does not own.
    ForeignBucket,
}

/// Single state machine for one bucket, parameterised by its topology and
/// a pluggable classification strategy.
pub struct DraftLifecycleReconciler {
    topology: BucketTopology,
    classifier: Arc<dyn EventClassifier>,
    dispatcher: Arc<NotificationDispatcher>,
    metrics: Arc<LifecycleMetrics>,
}

impl DraftLifecycleReconciler {
    pub fn new(
        topology: BucketTopology,
        classifier: Arc<dyn EventClassifier>,
        dispatcher: Arc<NotificationDispatcher>,
        metrics: Arc<LifecycleMetrics>,
    ) -> Self {
        Self {
            topology,
            classifier,
            dispatcher,
            metrics,
        }
    }

    pub fn topology(&self) -> &BucketTopology {
        &self.topology
    }

    pub fn metrics(&self) -> &Arc<LifecycleMetrics> {
        &self.metrics
    }

    /// Classify and reconcile one raw event.
    ///
    /// Unprocessable events are counted as dropped and returned as
    /// [`LifecycleError::Unprocessable`], whose disposition is to
    /// acknowledge. Every other error leaves the event for redelivery.
    #[instrument(skip_all, fields(bucket = %self.topology.bucket_name))]
    pub async fn handle(&self, raw: &RawEvent) -> Result<ReconcileOutcome, LifecycleError> {
        self.metrics.increment_received();
        let result = match self.classifier.classify(raw) {
            Ok(classified) => self.reconcile(classified).await,
            Err(e) => Err(e.into()),
        };
        match &result {
            Ok(outcome) => self.record(*outcome),
            Err(e) => match e.disposition() {
                Disposition::Acknowledge => {
                    warn!(error = %e, "dropping unprocessable event");
                    self.metrics.increment_dropped();
                }
                Disposition::Redeliver => {
                    warn!(error = %e, "event left for redelivery");
                    self.metrics.increment_failed();
                }
            },
        }
        result
    }

    /// Reconcile an already classified event.
    pub async fn reconcile(
        &self,
        classified: ClassifiedEvent,
    ) -> Result<ReconcileOutcome, LifecycleError> {
        let ClassifiedEvent { event, metadata } = classified;
        if let Some(bucket) = event.bucket.as_deref()
            && bucket != self.topology.bucket_name
        {
            debug!(event_bucket = bucket, "ignoring event from another bucket");
            return Ok(ReconcileOutcome::ForeignBucket);
        }

        let transition = event.transition();
        if transition == LifecycleTransition::VersionReplacement {
            debug!(
                generation = event.generation.as_deref().unwrap_or_default(),
                "suppressing delete of overwritten version"
            );
            return Ok(ReconcileOutcome::Suppressed);
        }

        let metadata = metadata?;
        let outcome = match transition {
            LifecycleTransition::FirstCreation => self.dispatcher.create(&metadata).await?,
            LifecycleTransition::Update => {
                self.dispatcher
                    .update(&metadata.subject_id, metadata.form_type)
                    .await?
            }
            LifecycleTransition::TerminalDeletion => self.dispatcher.close(&metadata).await?,
            LifecycleTransition::VersionReplacement => return Ok(ReconcileOutcome::Suppressed),
        };
        info!(
            ?transition,
            form_type = %metadata.form_type,
            draft_id = %metadata.draft_id,
            ?outcome,
            "event reconciled"
        );
        Ok(ReconcileOutcome::Dispatched(outcome))
    }

    fn record(&self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Dispatched(DispatchOutcome::Created) => {
                self.metrics.increment_created();
            }
            ReconcileOutcome::Dispatched(DispatchOutcome::Updated) => {
                self.metrics.increment_updated();
            }
            ReconcileOutcome::Dispatched(DispatchOutcome::Closed(n)) => {
                self.metrics.add_closed(n as u64);
            }
            ReconcileOutcome::Suppressed => self.metrics.increment_suppressed(),
            ReconcileOutcome::Dispatched(
                DispatchOutcome::Skipped(_) | DispatchOutcome::Disabled,
            )
            | ReconcileOutcome::ForeignBucket => self.metrics.increment_skipped(),
        }
    }
}
