use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ProviderError;

/// An object read back from the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Minimal object-store surface: whole-object put, get and delete.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `data` under `name`, replacing any previous version.
    async fn put(
        &self,
        bucket: &str,
        name: &str,
        content_type: &str,
        metadata: HashMap<String, String>,
        data: Bytes,
    ) -> Result<(), ProviderError>;

    /// Read an object. `Ok(None)` when it does not exist.
    async fn get(&self, bucket: &str, name: &str) -> Result<Option<StoredObject>, ProviderError>;

    /// Delete an object. Returns `false` when there was nothing to delete.
    async fn delete(&self, bucket: &str, name: &str) -> Result<bool, ProviderError>;
}
