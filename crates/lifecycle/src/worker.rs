//! Pull loops feeding subscription messages into the reconciler.
//!
//! Each loop handles one message at a time and acknowledges it only after
//! reconciliation finished or the event was found unprocessable. Transient
//! failures release the message for redelivery.

use std::sync::Arc;
use std::time::Duration;

use draftsync_provider::{EventSource, ReceivedMessage};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::classifier::RawEvent;
use crate::error::{Disposition, LifecycleError, bounded};
use crate::reconciler::DraftLifecycleReconciler;

/// Sizing and pacing of the pull loops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberSettings {
    /// Number of concurrent pull loops.
    pub workers: usize,
    /// Messages requested per pull.
    pub max_messages: u32,
    /// Pause after an empty or failed pull.
    pub poll_interval_ms: u64,
    /// Bound on each pull, acknowledge and release call.
    pub request_timeout_seconds: u64,
}

impl Default for SubscriberSettings {
    fn default() -> Self {
        Self {
            workers: 2,
            max_messages: 10,
            poll_interval_ms: 1_000,
            request_timeout_seconds: 10,
        }
    }
}

impl SubscriberSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Runs pull loops against one subscription.
pub struct SubscriptionWorker {
    source: Arc<dyn EventSource>,
    reconciler: Arc<DraftLifecycleReconciler>,
    settings: SubscriberSettings,
}

impl SubscriptionWorker {
    pub fn new(
        source: Arc<dyn EventSource>,
        reconciler: Arc<DraftLifecycleReconciler>,
        settings: SubscriberSettings,
    ) -> Self {
        Self {
            source,
            reconciler,
            settings,
        }
    }

    /// Spawn `workers` pull loops that stop when `cancel` fires.
    pub fn spawn(self: Arc<Self>, cancel: &CancellationToken) -> JoinSet<()> {
        let mut set = JoinSet::new();
        for id in 0..self.settings.workers.max(1) {
            let worker = Arc::clone(&self);
            let cancel = cancel.clone();
            set.spawn(async move { worker.run(id, cancel).await });
        }
        set
    }

    /// Pull and process until cancelled.
    pub async fn run(&self, id: usize, cancel: CancellationToken) {
        info!(worker = id, "subscription worker starting");
        loop {
            let handled = tokio::select! {
                () = cancel.cancelled() => break,
                result = self.poll_once() => result,
            };
            let idle = match handled {
                Ok(0) => true,
                Ok(n) => {
                    debug!(worker = id, handled = n, "batch processed");
                    false
                }
                Err(e) => {
                    warn!(worker = id, error = %e, "pull failed");
                    true
                }
            };
            if idle {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(self.settings.poll_interval()) => {}
                }
            }
        }
        info!(worker = id, "subscription worker stopped");
    }

    /// Pull one batch and process its messages in order. Returns the number
    /// of messages handled.
    pub async fn poll_once(&self) -> Result<usize, LifecycleError> {
        let timeout = self.settings.request_timeout();
        let batch = bounded("pull", timeout, self.source.pull(self.settings.max_messages))
            .await?
            .map_err(LifecycleError::Infrastructure)?;
        let count = batch.len();
        for message in batch {
            self.process(message).await;
        }
        Ok(count)
    }

    #[instrument(skip_all, fields(message_id = %message.message_id, attempt = message.delivery_attempt))]
    async fn process(&self, message: ReceivedMessage) {
        let raw = RawEvent::new(message.attributes, message.data);
        let disposition = match self.reconciler.handle(&raw).await {
            Ok(outcome) => {
                debug!(?outcome, "message handled");
                Disposition::Acknowledge
            }
            Err(e) => e.disposition(),
        };
        self.settle(&message.ack_id, disposition).await;
    }

    async fn settle(&self, ack_id: &str, disposition: Disposition) {
        let ids = [ack_id.to_owned()];
        let timeout = self.settings.request_timeout();
        let result = match disposition {
            Disposition::Acknowledge => bounded("acknowledge", timeout, self.source.acknowledge(&ids)).await,
            Disposition::Redeliver => bounded("release", timeout, self.source.release(&ids)).await,
        };
        if let Err(e) = result.and_then(|r| r.map_err(LifecycleError::Infrastructure)) {
            error!(?disposition, error = %e, "failed to settle message");
        }
    }
}
