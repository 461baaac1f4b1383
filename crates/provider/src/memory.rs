use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::ProviderError;
use crate::object::{ObjectStore, StoredObject};

/// In-memory [`ObjectStore`] backed by a [`DashMap`] keyed by
/// `(bucket, name)`.
///
/// Used for local development and tests; nothing survives a restart and no
/// storage notifications are emitted.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<(String, String), StoredObject>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        bucket: &str,
        name: &str,
        content_type: &str,
        metadata: HashMap<String, String>,
        data: Bytes,
    ) -> Result<(), ProviderError> {
        self.objects.insert(
            (bucket.to_owned(), name.to_owned()),
            StoredObject {
                data,
                content_type: Some(content_type.to_owned()),
                metadata,
            },
        );
        Ok(())
    }

    async fn get(&self, bucket: &str, name: &str) -> Result<Option<StoredObject>, ProviderError> {
        Ok(self
            .objects
            .get(&(bucket.to_owned(), name.to_owned()))
            .map(|entry| entry.value().clone()))
    }

    async fn delete(&self, bucket: &str, name: &str) -> Result<bool, ProviderError> {
        Ok(self
            .objects
            .remove(&(bucket.to_owned(), name.to_owned()))
            .is_some())
    }
}
