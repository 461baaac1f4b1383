//! Wiring of the lifecycle components from configuration.
//!
//! With a `[gcp]` section the service talks to Google Cloud: bucket wiring is
//! provisioned on start, a pull subscription feeds the reconciler and drafts
//! are encrypted with Cloud KMS. Without it everything runs in process, which
//! is enough for the draft API and local development.

use std::sync::Arc;

use draftsync_core::BucketTopology;
use draftsync_core::topology::topic_path;
use draftsync_crypto::{EnvelopeAead, KeyEncryptionKey, KeyUri, LocalKek};
use draftsync_gcp::{GcpInfraAdmin, GcpKmsKek, PullSubscription, RestClient};
use draftsync_lifecycle::{
    BucketConfig, DraftLifecycleReconciler, EnvelopeCryptoStore, InfraProvisioner,
    LifecycleMetrics, NotificationDispatcher, StorageNotificationClassifier, SubscriptionWorker,
};
use draftsync_provider::{
    DynPublisher, EventSource, LogPublisher, MemoryObjectStore, ObjectStore,
};
use draftsync_state::DraftStore;
use tracing::{info, warn};

use crate::api::AppState;
use crate::config::DraftsyncConfig;
use crate::error::ServerError;
use crate::state_factory::create_store;

/// Everything `serve` runs.
pub struct Components {
    pub metrics: Arc<LifecycleMetrics>,
    pub store: Arc<dyn DraftStore>,
    pub drafts: Arc<EnvelopeCryptoStore>,
    pub reconciler: Arc<DraftLifecycleReconciler>,
    pub provisioner: Option<Arc<InfraProvisioner>>,
    pub bucket: BucketConfig,
    /// Subscription feeding the reconciler; absent when running locally.
    pub source: Option<Arc<dyn EventSource>>,
}

impl Components {
    pub async fn build(config: &DraftsyncConfig) -> Result<Self, ServerError> {
        let metrics = Arc::new(LifecycleMetrics::default());
        let store = create_store(&config.state).await?;
        let bucket = config
            .bucket
            .to_bucket_config(config.project_id().unwrap_or("local"));
        let timeout = config.subscriber.request_timeout();

        let rest = config
            .gcp
            .as_ref()
            .map(RestClient::new)
            .transpose()
            .map_err(|e| ServerError::Config(format!("gcp: {e}")))?;

        let aead = Arc::new(EnvelopeAead::new(create_kek(config, rest.as_ref())?));
        let drafts = Arc::new(
            EnvelopeCryptoStore::new(
                create_object_store(config).await?,
                aead,
                bucket.bucket_name.clone(),
            )
            .with_call_timeout(timeout)
            .with_allowed_types(config.attachments.allowed_types.iter().cloned()),
        );

        let dispatcher = Arc::new(
            NotificationDispatcher::new(
                Arc::clone(&store),
                create_publisher(config).await?,
                config.notifications.settings.clone(),
                Arc::clone(&metrics),
            )
            .with_call_timeout(timeout),
        );

        let (provisioner, topology, source) = if let Some(rest) = rest {
            let provisioner = Arc::new(InfraProvisioner::new(Arc::new(GcpInfraAdmin::new(
                rest.clone(),
            ))));
            let topology = provisioner.ensure(&bucket).await?;
            let source: Arc<dyn EventSource> =
                Arc::new(PullSubscription::new(rest, topology.subscription_path()));
            (Some(provisioner), topology, Some(source))
        } else {
            warn!("no [gcp] section, running without storage event subscriber");
            (None, local_topology(&bucket), None)
        };

        let reconciler = Arc::new(DraftLifecycleReconciler::new(
            topology,
            Arc::new(StorageNotificationClassifier),
            dispatcher,
            Arc::clone(&metrics),
        ));

        Ok(Self {
            metrics,
            store,
            drafts,
            reconciler,
            provisioner,
            bucket,
            source,
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            metrics: Arc::clone(&self.metrics),
            store: Arc::clone(&self.store),
            drafts: Arc::clone(&self.drafts),
            provisioner: self.provisioner.clone(),
            bucket: Arc::new(self.bucket.clone()),
        }
    }

    /// The subscription worker, when a subscription is configured.
    pub fn worker(&self, config: &DraftsyncConfig) -> Option<Arc<SubscriptionWorker>> {
        self.source.as_ref().map(|source| {
            Arc::new(SubscriptionWorker::new(
                Arc::clone(source),
                Arc::clone(&self.reconciler),
                config.subscriber.clone(),
            ))
        })
    }
}

/// Run the provisioner once for the configured bucket.
pub async fn provision(config: &DraftsyncConfig) -> Result<BucketTopology, ServerError> {
    let gcp = config
        .gcp
        .as_ref()
        .ok_or_else(|| ServerError::Config("provisioning requires a [gcp] section".into()))?;
    let rest = RestClient::new(gcp).map_err(|e| ServerError::Config(format!("gcp: {e}")))?;
    let provisioner = InfraProvisioner::new(Arc::new(GcpInfraAdmin::new(rest)));
    Ok(provisioner
        .ensure(&config.bucket.to_bucket_config(&gcp.project_id))
        .await?)
}

fn local_topology(bucket: &BucketConfig) -> BucketTopology {
    BucketTopology {
        project_id: bucket.project_id.clone(),
        bucket_name: bucket.bucket_name.clone(),
        topic_name: bucket.topic_name.clone(),
        subscription_name: bucket.subscription_name.clone(),
        notification_id: String::new(),
    }
}

fn create_kek(
    config: &DraftsyncConfig,
    rest: Option<&RestClient>,
) -> Result<Arc<dyn KeyEncryptionKey>, ServerError> {
    let raw = config
        .kms
        .key_uri
        .as_deref()
        .ok_or_else(|| ServerError::Config("[kms] key_uri is required".into()))?;
    match raw.parse::<KeyUri>()? {
        KeyUri::Local(key) => {
            warn!("using an in-process key-encryption key");
            Ok(Arc::new(LocalKek::new(key)))
        }
        KeyUri::GcpKms(name) => {
            let rest = rest.ok_or_else(|| {
                ServerError::Config("a gcp-kms key_uri requires a [gcp] section".into())
            })?;
            info!(key = %name, "using Cloud KMS key-encryption key");
            Ok(Arc::new(GcpKmsKek::new(rest.clone(), name)))
        }
    }
}

async fn create_object_store(config: &DraftsyncConfig) -> Result<Arc<dyn ObjectStore>, ServerError> {
    let Some(ref gcp) = config.gcp else {
        info!("no [gcp] section, drafts are kept in memory");
        return Ok(Arc::new(MemoryObjectStore::new()));
    };

    #[cfg(feature = "gcp-storage")]
    {
        let store = draftsync_gcp::GcsObjectStore::new(gcp)
            .await
            .map_err(|e| ServerError::Config(format!("cloud storage: {e}")))?;
        Ok(Arc::new(store))
    }
    #[cfg(not(feature = "gcp-storage"))]
    {
        Err(ServerError::Config(format!(
            "storing drafts in project {} requires the gcp-storage feature",
            gcp.project_id
        )))
    }
}

async fn create_publisher(config: &DraftsyncConfig) -> Result<Arc<dyn DynPublisher>, ServerError> {
    let notifications = &config.notifications;
    if !notifications.send_enabled {
        info!("sending disabled, notifications are logged only");
        return Ok(Arc::new(LogPublisher::new("log")));
    }
    let (Some(gcp), Some(topic)) = (config.gcp.as_ref(), notifications.topic.as_deref()) else {
        warn!("no notification topic configured, notifications are logged only");
        return Ok(Arc::new(LogPublisher::new("log")));
    };

    #[cfg(feature = "gcp-pubsub")]
    {
        let publisher =
            draftsync_gcp::PubSubPublisher::new(gcp, topic_path(&gcp.project_id, topic))
                .await
                .map_err(|e| ServerError::Config(format!("pubsub publisher: {e}")))?;
        info!(topic, "publishing notifications to Pub/Sub");
        Ok(Arc::new(publisher))
    }
    #[cfg(not(feature = "gcp-pubsub"))]
    {
        Err(ServerError::Config(format!(
            "publishing to {} requires the gcp-pubsub feature",
            topic_path(&gcp.project_id, topic)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL_KEY: &str =
        "local-kms://000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn local_config() -> DraftsyncConfig {
        DraftsyncConfig::from_toml(&format!("[kms]\nkey_uri = \"{LOCAL_KEY}\"\n")).unwrap()
    }

    #[tokio::test]
    async fn builds_local_components() {
        let components = Components::build(&local_config()).await.unwrap();
        assert!(components.provisioner.is_none());
        assert!(components.source.is_none());
        assert!(components.worker(&local_config()).is_none());
        assert_eq!(components.bucket.bucket_name, "drafts");
        assert_eq!(components.reconciler.topology().project_id, "local");
    }

    #[tokio::test]
    async fn key_uri_is_required() {
        let err = Components::build(&DraftsyncConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::Config(msg) if msg.contains("key_uri")));
    }

    #[tokio::test]
    async fn kms_key_needs_gcp() {
        let config = DraftsyncConfig::from_toml(
            "[kms]\nkey_uri = \"gcp-kms://projects/p/locations/l/keyRings/r/cryptoKeys/k\"\n",
        )
        .unwrap();
        let err = Components::build(&config).await.err().unwrap();
        assert!(matches!(err, ServerError::Config(msg) if msg.contains("[gcp]")));
    }

    #[cfg(not(feature = "gcp-storage"))]
    #[tokio::test]
    async fn gcp_storage_without_feature_is_rejected() {
        let config = DraftsyncConfig::from_toml(&format!(
            "[gcp]\nproject_id = \"p\"\n\n[kms]\nkey_uri = \"{LOCAL_KEY}\"\n"
        ))
        .unwrap();
        let err = create_object_store(&config).await.err().unwrap();
        assert!(matches!(err, ServerError::Config(msg) if msg.contains("gcp-storage")));
    }

    #[tokio::test]
    async fn provisioning_needs_gcp() {
        let err = provision(&local_config()).await.unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
