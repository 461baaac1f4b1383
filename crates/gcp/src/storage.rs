use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use draftsync_provider::{ObjectStore, ProviderError, StoredObject};
use google_cloud_storage::client::{Storage, StorageControl};
use tracing::{debug, error, info, instrument};

use crate::auth::build_gcp_credentials;
use crate::config::GcpBaseConfig;
use crate::error::{GcpProviderError, classify_gcp_error};

/// Cloud Storage implementation of [`ObjectStore`].
pub struct GcsObjectStore {
    storage: Storage,
    control: StorageControl,
}

impl std::fmt::Debug for GcsObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsObjectStore").finish_non_exhaustive()
    }
}

/// Format a bucket name into the Cloud Storage v2 resource path.
fn bucket_path(bucket: &str) -> String {
    format!("projects/_/buckets/{bucket}")
}

fn classify(operation: &str, err: &impl std::fmt::Display) -> GcpProviderError {
    let err_str = err.to_string();
    let classified = classify_gcp_error(&err_str);
    if !matches!(classified, GcpProviderError::NotFound(_)) {
        error!(error = %err_str, operation, "Cloud Storage call failed");
    }
    classified
}

impl GcsObjectStore {
    /// Build the Cloud Storage data and control clients.
    pub async fn new(config: &GcpBaseConfig) -> Result<Self, ProviderError> {
        let credentials = build_gcp_credentials(
            config.credentials_path.as_deref(),
            config.credentials_json.as_deref(),
        )
        .await
        .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        let mut storage_builder = Storage::builder();
        if let Some(ref endpoint) = config.endpoint_url {
            storage_builder = storage_builder.with_endpoint(endpoint);
        }
        if let Some(ref creds) = credentials {
            storage_builder = storage_builder.with_credentials(creds.clone());
        }
        let storage = storage_builder.build().await.map_err(|e| {
            ProviderError::Configuration(format!("Cloud Storage client error: {e}"))
        })?;

        let mut control_builder = StorageControl::builder();
        if let Some(ref endpoint) = config.endpoint_url {
            control_builder = control_builder.with_endpoint(endpoint);
        }
        if let Some(creds) = credentials {
            control_builder = control_builder.with_credentials(creds);
        }
        let control = control_builder.build().await.map_err(|e| {
            ProviderError::Configuration(format!("Cloud Storage control client error: {e}"))
        })?;

        Ok(Self { storage, control })
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    #[instrument(skip(self, metadata, data), fields(size = data.len()))]
    async fn put(
        &self,
        bucket: &str,
        name: &str,
        content_type: &str,
        metadata: HashMap<String, String>,
        data: Bytes,
    ) -> Result<(), ProviderError> {
        let path = bucket_path(bucket);
        let mut write_request = self
            .storage
            .write_object(&path, name, data)
            .set_content_type(content_type);
        if !metadata.is_empty() {
            write_request = write_request.set_metadata(metadata);
        }
        Box::pin(write_request.send_buffered())
            .await
            .map_err(|e| classify("write", &e))?;
        info!("object written");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, bucket: &str, name: &str) -> Result<Option<StoredObject>, ProviderError> {
        let path = bucket_path(bucket);
        let object = match self
            .control
            .get_object()
            .set_bucket(&path)
            .set_object(name)
            .send()
            .await
        {
            Ok(object) => object,
            Err(e) => {
                return match classify("stat", &e) {
                    GcpProviderError::NotFound(_) => Ok(None),
                    other => Err(other.into()),
                };
            }
        };

        let mut response = match self.storage.read_object(&path, name).send().await {
            Ok(response) => response,
            Err(e) => {
                return match classify("read", &e) {
                    GcpProviderError::NotFound(_) => Ok(None),
                    other => Err(other.into()),
                };
            }
        };
        let mut body = Vec::new();
        while let Some(chunk) = response.next().await {
            let chunk = chunk.map_err(|e| {
                ProviderError::ExecutionFailed(format!("failed to read object body: {e}"))
            })?;
            body.extend_from_slice(&chunk);
        }
        debug!(size = body.len(), "object read");

        Ok(Some(StoredObject {
            data: Bytes::from(body),
            content_type: Some(object.content_type).filter(|c| !c.is_empty()),
            metadata: object.metadata.into_iter().collect(),
        }))
    }

    #[instrument(skip(self))]
    async fn delete(&self, bucket: &str, name: &str) -> Result<bool, ProviderError> {
        let result = self
            .control
            .delete_object()
            .set_bucket(bucket_path(bucket))
            .set_object(name)
            .send()
            .await;
        match result {
            Ok(_) => {
                info!("object deleted");
                Ok(true)
            }
            Err(e) => match classify("delete", &e) {
                GcpProviderError::NotFound(_) => Ok(false),
                other => Err(other.into()),
            },
        }
    }
}
