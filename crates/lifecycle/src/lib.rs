//! Storage-event-driven draft notification lifecycle.
//!
//! Storage notifications arrive through a [`SubscriptionWorker`], are
//! classified by an [`EventClassifier`] and drive the
//! [`DraftLifecycleReconciler`], which asks the [`NotificationDispatcher`] to
//! create, refresh or close the citizen-facing notification for a draft.
//! [`InfraProvisioner`] sets up the wiring between bucket and subscription,
//! and [`EnvelopeCryptoStore`] keeps the drafts themselves encrypted.

pub mod classifier;
pub mod crypto_store;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod provisioner;
pub mod reconciler;
pub mod worker;

pub use classifier::{ClassifiedEvent, EventClassifier, RawEvent, StorageNotificationClassifier};
pub use crypto_store::{DEFAULT_ATTACHMENT_TYPES, Document, EnvelopeCryptoStore};
pub use dispatcher::{
    DispatchOutcome, ItemSettings, NotificationDispatcher, NotificationSettings, SkipReason,
};
pub use error::{Disposition, LifecycleError, Unprocessable};
pub use metrics::{LifecycleMetrics, MetricsSnapshot};
pub use provisioner::{BucketConfig, InfraProvisioner, InfraSection, InfraView};
pub use reconciler::{DraftLifecycleReconciler, ReconcileOutcome};
pub use worker::{SubscriberSettings, SubscriptionWorker};
