//! Encrypted document storage bound to the owning subject.
//!
//! Blobs are sealed with [`EnvelopeAead`] using the subject id as
//! associated data, so a ciphertext moved under another subject's prefix
//! fails to open instead of leaking plaintext.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use draftsync_core::{BlobId, FormType, SubjectId, object_key};
use draftsync_crypto::{EnvelopeAead, KEY_TEMPLATE};
use draftsync_provider::ObjectStore;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::classifier::metadata_keys;
use crate::error::{LifecycleError, bounded};

const ENCRYPTED_CONTENT_TYPE: &str = "application/octet-stream";

/// Attachment types accepted unless configured otherwise.
pub const DEFAULT_ATTACHMENT_TYPES: [&str; 3] = ["application/pdf", "image/jpeg", "image/png"];

/// A decrypted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub data: Vec<u8>,
    /// Object metadata written alongside the blob.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Content type the document was stored with.
    pub fn content_type(&self) -> &str {
        self.metadata
            .get(metadata_keys::CONTENT_TYPE)
            .map_or(ENCRYPTED_CONTENT_TYPE, String::as_str)
    }

    pub fn filename(&self) -> Option<&str> {
        self.metadata.get(metadata_keys::FILENAME).map(String::as_str)
    }
}

/// Object storage with envelope encryption and subject binding.
pub struct EnvelopeCryptoStore {
    objects: Arc<dyn ObjectStore>,
    aead: Arc<EnvelopeAead>,
    bucket: String,
    allowed_types: Vec<String>,
    call_timeout: Duration,
}

impl EnvelopeCryptoStore {
    pub fn new(objects: Arc<dyn ObjectStore>, aead: Arc<EnvelopeAead>, bucket: impl Into<String>) -> Self {
        Self {
            objects,
            aead,
            bucket: bucket.into(),
            allowed_types: DEFAULT_ATTACHMENT_TYPES.map(str::to_owned).to_vec(),
            call_timeout: Duration::from_secs(10),
        }
    }

    /// Replace the accepted attachment content types.
    #[must_use]
    pub fn with_allowed_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_types = types
            .into_iter()
            .map(|t| t.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Bound applied to every object storage call.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Encrypt and store an attachment under a fresh blob id.
    ///
    /// `content_type` must be one of the accepted types; parameters such as
    /// `charset` are ignored. The type and filename are kept as object
    /// metadata.
    #[instrument(skip_all, fields(subject = %subject, bucket = %self.bucket, content_type = %content_type))]
    pub async fn store(
        &self,
        subject: &SubjectId,
        content_type: &str,
        filename: Option<&str>,
        plaintext: &[u8],
    ) -> Result<BlobId, LifecycleError> {
        let content_type = self.accepted(content_type)?;
        let mut metadata = HashMap::from([(metadata_keys::CONTENT_TYPE.to_owned(), content_type)]);
        if let Some(name) = filename.filter(|n| !n.is_empty()) {
            metadata.insert(metadata_keys::FILENAME.to_owned(), name.to_owned());
        }
        let blob = BlobId::random();
        self.write(subject, &blob, plaintext, metadata).await?;
        Ok(blob)
    }

    fn accepted(&self, content_type: &str) -> Result<String, LifecycleError> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if self.allowed_types.iter().any(|t| *t == essence) {
            Ok(essence)
        } else {
            Err(LifecycleError::UnsupportedContentType(content_type.to_owned()))
        }
    }

    /// Encrypt and store the subject's draft for `form_type`.
    ///
    /// The object metadata carries the form type and a fresh draft id, which
    /// is what storage notifications hand back to the classifier.
    #[instrument(skip_all, fields(subject = %subject, form_type = %form_type))]
    pub async fn store_draft(
        &self,
        subject: &SubjectId,
        form_type: FormType,
        plaintext: &[u8],
    ) -> Result<Uuid, LifecycleError> {
        let draft_id = Uuid::new_v4();
        let metadata = HashMap::from([
            (metadata_keys::FORM_TYPE.to_owned(), form_type.as_str().to_owned()),
            (metadata_keys::DRAFT_ID.to_owned(), draft_id.to_string()),
        ]);
        self.write(subject, &BlobId::for_form(form_type), plaintext, metadata)
            .await?;
        Ok(draft_id)
    }

    /// Read and decrypt a blob. `Ok(None)` when it does not exist.
    #[instrument(skip_all, fields(subject = %subject, blob = %blob))]
    pub async fn retrieve(
        &self,
        subject: &SubjectId,
        blob: &BlobId,
    ) -> Result<Option<Vec<u8>>, LifecycleError> {
        Ok(self.retrieve_document(subject, blob).await?.map(|d| d.data))
    }

    /// Read and decrypt a blob together with its object metadata.
    pub async fn retrieve_document(
        &self,
        subject: &SubjectId,
        blob: &BlobId,
    ) -> Result<Option<Document>, LifecycleError> {
        let name = object_key(subject, blob);
        let Some(object) = bounded("object get", self.call_timeout, self.objects.get(&self.bucket, &name))
            .await?
            .map_err(LifecycleError::Storage)?
        else {
            debug!("blob not found");
            return Ok(None);
        };
        let data = self
            .aead
            .decrypt(&object.data, subject.expose().as_bytes())
            .await?;
        Ok(Some(Document {
            data,
            metadata: object.metadata,
        }))
    }

    /// Delete a blob. Returns `false` when there was nothing to delete.
    #[instrument(skip_all, fields(subject = %subject, blob = %blob))]
    pub async fn erase(&self, subject: &SubjectId, blob: &BlobId) -> Result<bool, LifecycleError> {
        let name = object_key(subject, blob);
        let deleted = bounded("object delete", self.call_timeout, self.objects.delete(&self.bucket, &name))
            .await?
            .map_err(LifecycleError::Storage)?;
        debug!(deleted, "blob erased");
        Ok(deleted)
    }

    async fn write(
        &self,
        subject: &SubjectId,
        blob: &BlobId,
        plaintext: &[u8],
        mut metadata: HashMap<String, String>,
    ) -> Result<(), LifecycleError> {
        let sealed = self
            .aead
            .encrypt(plaintext, subject.expose().as_bytes())
            .await?;
        metadata.insert(metadata_keys::KEY_TEMPLATE.to_owned(), KEY_TEMPLATE.to_owned());

        let name = object_key(subject, blob);
        bounded(
            "object put",
            self.call_timeout,
            self.objects.put(
                &self.bucket,
                &name,
                ENCRYPTED_CONTENT_TYPE,
                metadata,
                Bytes::from(sealed),
            ),
        )
        .await?
        .map_err(LifecycleError::Storage)?;
        debug!(size = plaintext.len(), "blob stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use draftsync_crypto::{CryptoError, DataKey, LocalKek, MasterKey, parse_master_key};
    use draftsync_provider::MemoryObjectStore;

    use super::*;

    fn master_key() -> MasterKey {
        parse_master_key(&"42".repeat(32)).unwrap()
    }

    fn store() -> (EnvelopeCryptoStore, Arc<MemoryObjectStore>) {
        let objects = Arc::new(MemoryObjectStore::new());
        let aead = Arc::new(EnvelopeAead::new(Arc::new(LocalKek::new(master_key()))));
        (EnvelopeCryptoStore::new(objects.clone(), aead, "drafts"), objects)
    }

    fn subject(raw: &str) -> SubjectId {
        SubjectId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn store_then_retrieve() {
        let (store, objects) = store();
        let alice = subject("01017012345");
        let blob = store
            .store(&alice, "application/pdf", Some("payslip.pdf"), b"payslip contents")
            .await
            .unwrap();

        let raw = objects.get("drafts", &object_key(&alice, &blob)).await.unwrap().unwrap();
        assert_ne!(raw.data.as_ref(), b"payslip contents");
        assert_eq!(raw.metadata[metadata_keys::KEY_TEMPLATE], KEY_TEMPLATE);
        assert_eq!(raw.metadata[metadata_keys::CONTENT_TYPE], "application/pdf");
        assert_eq!(raw.content_type.as_deref(), Some(ENCRYPTED_CONTENT_TYPE));

        let doc = store.retrieve_document(&alice, &blob).await.unwrap().unwrap();
        assert_eq!(doc.data, b"payslip contents");
        assert_eq!(doc.content_type(), "application/pdf");
        assert_eq!(doc.filename(), Some("payslip.pdf"));
    }

    #[tokio::test]
    async fn ciphertext_is_bound_to_its_subject() {
        let (store, objects) = store();
        let alice = subject("01017012345");
        let bob = subject("02028054321");
        let blob = store.store(&alice, "image/png", None, b"secret").await.unwrap();

        let sealed = objects.get("drafts", &object_key(&alice, &blob)).await.unwrap().unwrap();
        objects
            .put("drafts", &object_key(&bob, &blob), ENCRYPTED_CONTENT_TYPE, HashMap::new(), sealed.data)
            .await
            .unwrap();

        let err = store.retrieve(&bob, &blob).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Crypto(CryptoError::DecryptionFailed)));
    }

    #[tokio::test]
    async fn draft_metadata_is_written() {
        let (store, objects) = store();
        let alice = subject("01017012345");
        let draft_id = store
            .store_draft(&alice, FormType::Abroad, b"{\"answers\":[]}")
            .await
            .unwrap();

        let raw = objects.get("drafts", "01017012345/ABROAD").await.unwrap().unwrap();
        assert_eq!(raw.metadata[metadata_keys::FORM_TYPE], "ABROAD");
        assert_eq!(raw.metadata[metadata_keys::DRAFT_ID], draft_id.to_string());
        assert_eq!(raw.content_type.as_deref(), Some(ENCRYPTED_CONTENT_TYPE));

        let doc = store
            .retrieve_document(&alice, &BlobId::for_form(FormType::Abroad))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.data, b"{\"answers\":[]}");
    }

    #[tokio::test]
    async fn missing_and_erased_blobs() {
        let (store, _) = store();
        let alice = subject("01017012345");
        assert_eq!(store.retrieve(&alice, &BlobId::random()).await.unwrap(), None);

        let blob = store.store(&alice, "image/jpeg", None, b"x").await.unwrap();
        assert!(store.erase(&alice, &blob).await.unwrap());
        assert!(!store.erase(&alice, &blob).await.unwrap());
        assert_eq!(store.retrieve(&alice, &blob).await.unwrap(), None);
    }

    #[tokio::test]
    async fn content_type_must_be_accepted() {
        let (store, objects) = store();
        let alice = subject("01017012345");

        let err = store
            .store(&alice, "text/html", Some("page.html"), b"<html>")
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::UnsupportedContentType(ref t) if t == "text/html"));
        assert!(objects.is_empty());

        let blob = store
            .store(&alice, "Image/PNG; charset=binary", None, b"png")
            .await
            .unwrap();
        let doc = store.retrieve_document(&alice, &blob).await.unwrap().unwrap();
        assert_eq!(doc.content_type(), "image/png");
        assert_eq!(doc.filename(), None);

        let store = store.with_allowed_types(["text/plain"]);
        assert!(store.store(&alice, "text/plain", None, b"t").await.is_ok());
        assert!(store.store(&alice, "application/pdf", None, b"p").await.is_err());
    }

    struct UnavailableKek;

    #[async_trait]
    impl draftsync_crypto::KeyEncryptionKey for UnavailableKek {
        fn key_uri(&self) -> &str {
            "gcp-kms://projects/p/locations/l/keyRings/r/cryptoKeys/k"
        }

        async fn wrap_key(&self, _key: &DataKey) -> Result<Vec<u8>, CryptoError> {
            Err(CryptoError::KmsUnavailable("503".into()))
        }

        async fn unwrap_key(&self, _wrapped: &[u8]) -> Result<DataKey, CryptoError> {
            Err(CryptoError::KmsUnavailable("503".into()))
        }
    }

    #[tokio::test]
    async fn kms_outage_writes_nothing() {
        let objects = Arc::new(MemoryObjectStore::new());
        let aead = Arc::new(EnvelopeAead::new(Arc::new(UnavailableKek)));
        let store = EnvelopeCryptoStore::new(objects.clone(), aead, "drafts");

        let err = store
            .store(&subject("01017012345"), "application/pdf", None, b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Crypto(CryptoError::KmsUnavailable(_))));
        assert!(objects.is_empty());
    }
}
