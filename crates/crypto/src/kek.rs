use std::fmt;
use std::str::FromStr;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;

use crate::error::CryptoError;
use crate::key::{DataKey, MasterKey, parse_master_key};

const GCP_KMS_PREFIX: &str = "gcp-kms://";
const LOCAL_KMS_PREFIX: &str = "local-kms://";

/// Associated data bound to every locally wrapped data key.
const LOCAL_WRAP_AAD: &[u8] = b"draftsync-data-key";

const NONCE_LEN: usize = 12;

/// A key-encryption key: wraps and unwraps data keys.
///
/// Production implementations delegate to a remote key-management service;
/// the key never leaves it.
#[async_trait]
pub trait KeyEncryptionKey: Send + Sync {
    /// The URI this key was resolved from.
    fn key_uri(&self) -> &str;

    /// Encrypt a raw data key.
    async fn wrap_key(&self, data_key: &DataKey) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt a wrapped data key.
    async fn unwrap_key(&self, wrapped: &[u8]) -> Result<DataKey, CryptoError>;
}

/// A parsed key URI.
pub enum KeyUri {
    /// `gcp-kms://projects/<p>/locations/<l>/keyRings/<r>/cryptoKeys/<k>`;
    /// holds the resource name without the scheme.
    GcpKms(String),
    /// `local-kms://<hex or base64 key>`.
    Local(MasterKey),
}

impl FromStr for KeyUri {
    type Err = CryptoError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if let Some(resource) = raw.strip_prefix(GCP_KMS_PREFIX) {
            if !resource.starts_with("projects/") || !resource.contains("/cryptoKeys/") {
                return Err(CryptoError::InvalidKeyUri(format!(
                    "expected {GCP_KMS_PREFIX}projects/.../cryptoKeys/..."
                )));
            }
            return Ok(Self::GcpKms(resource.to_owned()));
        }
        if let Some(material) = raw.strip_prefix(LOCAL_KMS_PREFIX) {
            return Ok(Self::Local(parse_master_key(material)?));
        }
        Err(CryptoError::InvalidKeyUri(format!(
            "unsupported scheme, expected {GCP_KMS_PREFIX} or {LOCAL_KMS_PREFIX}"
        )))
    }
}

impl fmt::Debug for KeyUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GcpKms(name) => f.debug_tuple("GcpKms").field(name).finish(),
            Self::Local(_) => f.write_str("Local([REDACTED])"),
        }
    }
}

/// Key-encryption key held in process memory.
///
/// Wrapped keys are `nonce (12) || AES-256-GCM(data key)`.
pub struct LocalKek {
    key: MasterKey,
}

impl LocalKek {
    pub fn new(key: MasterKey) -> Self {
        Self { key }
    }

    fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        Aes256Gcm::new_from_slice(self.key.as_bytes())
            .map_err(|e| CryptoError::InvalidKey(format!("invalid AES key: {e}")))
    }
}

impl fmt::Debug for LocalKek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKek").finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyEncryptionKey for LocalKek {
    fn key_uri(&self) -> &str {
        "local-kms://"
    }

    async fn wrap_key(&self, data_key: &DataKey) -> Result<Vec<u8>, CryptoError> {
        let cipher = self.cipher()?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: data_key.as_bytes(),
                    aad: LOCAL_WRAP_AAD,
                },
            )
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    async fn unwrap_key(&self, wrapped: &[u8]) -> Result<DataKey, CryptoError> {
        if wrapped.len() <= NONCE_LEN {
            return Err(CryptoError::InvalidFormat(format!(
                "wrapped key too short: {} bytes",
                wrapped.len()
            )));
        }
        let (nonce, sealed) = wrapped.split_at(NONCE_LEN);
        let cipher = self.cipher()?;
        let raw = cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: LOCAL_WRAP_AAD,
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed)?;
        DataKey::from_slice(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kek(byte: u8) -> LocalKek {
        LocalKek::new(parse_master_key(&hex::encode([byte; 32])).unwrap())
    }

    #[tokio::test]
    async fn local_wrap_roundtrip() {
        let kek = kek(1);
        let dek = DataKey::generate();
        let wrapped = kek.wrap_key(&dek).await.unwrap();
        assert_ne!(&wrapped[NONCE_LEN..], dek.as_bytes());
        let unwrapped = kek.unwrap_key(&wrapped).await.unwrap();
        assert_eq!(unwrapped.as_bytes(), dek.as_bytes());
    }

    #[tokio::test]
    async fn unwrap_with_other_key_fails() {
        let wrapped = kek(1).wrap_key(&DataKey::generate()).await.unwrap();
        let err = kek(2).unwrap_key(&wrapped).await.unwrap_err();
        assert!(matches!(err, CryptoError::DecryptionFailed));
    }

    #[tokio::test]
    async fn unwrap_truncated_input() {
        let err = kek(1).unwrap_key(&[0u8; 4]).await.unwrap_err();
        assert!(matches!(err, CryptoError::InvalidFormat(_)));
    }

    #[test]
    fn parse_gcp_key_uri() {
        let uri: KeyUri = "gcp-kms://projects/p/locations/europe-north1/keyRings/r/cryptoKeys/k"
            .parse()
            .unwrap();
        match uri {
            KeyUri::GcpKms(name) => assert_eq!(
                name,
                "projects/p/locations/europe-north1/keyRings/r/cryptoKeys/k"
            ),
            KeyUri::Local(_) => panic!("expected gcp key uri"),
        }
    }

    #[test]
    fn parse_local_key_uri() {
        let uri: KeyUri = format!("local-kms://{}", "0f".repeat(32)).parse().unwrap();
        assert!(matches!(uri, KeyUri::Local(_)));
        assert_eq!(format!("{uri:?}"), "Local([REDACTED])");
    }

    #[test]
    fn reject_unknown_scheme() {
        assert!(matches!(
            "aws-kms://arn:aws:kms:...".parse::<KeyUri>(),
            Err(CryptoError::InvalidKeyUri(_))
        ));
        assert!(matches!(
            "gcp-kms://not-a-key".parse::<KeyUri>(),
            Err(CryptoError::InvalidKeyUri(_))
        ));
    }
}
