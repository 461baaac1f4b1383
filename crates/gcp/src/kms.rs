use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use draftsync_crypto::{CryptoError, DataKey, KeyEncryptionKey};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::rest::RestClient;

#[derive(Serialize)]
struct EncryptRequest {
    plaintext: String,
}

#[derive(Deserialize)]
struct EncryptResponse {
    ciphertext: String,
}

#[derive(Serialize)]
struct DecryptRequest {
    ciphertext: String,
}

#[derive(Deserialize)]
struct DecryptResponse {
    plaintext: String,
}

/// Key-encryption key held in Cloud KMS.
///
/// Data keys are wrapped and unwrapped by the `:encrypt` and `:decrypt`
/// methods of the crypto key; key material never leaves KMS.
#[derive(Debug, Clone)]
pub struct GcpKmsKek {
    rest: RestClient,
    key_name: String,
    key_uri: String,
}

impl GcpKmsKek {
    /// `key_name` is the resource name
    /// `projects/<p>/locations/<l>/keyRings/<r>/cryptoKeys/<k>`.
    pub fn new(rest: RestClient, key_name: impl Into<String>) -> Self {
        let key_name = key_name.into();
        Self {
            key_uri: format!("gcp-kms://{key_name}"),
            rest,
            key_name,
        }
    }

    fn url(&self, verb: &str) -> String {
        format!(
            "{}/{}:{verb}",
            self.rest.endpoints().kms.trim_end_matches('/'),
            self.key_name
        )
    }
}

#[async_trait]
impl KeyEncryptionKey for GcpKmsKek {
    fn key_uri(&self) -> &str {
        &self.key_uri
    }

    #[instrument(skip_all, fields(key = %self.key_name))]
    async fn wrap_key(&self, data_key: &DataKey) -> Result<Vec<u8>, CryptoError> {
        let request = EncryptRequest {
            plaintext: B64.encode(data_key.as_bytes()),
        };
        let response: EncryptResponse = self
            .rest
            .send(Method::POST, &self.url("encrypt"), &request)
            .await?;
        B64.decode(response.ciphertext)
            .map_err(|e| CryptoError::InvalidFormat(format!("KMS ciphertext is not base64: {e}")))
    }

    #[instrument(skip_all, fields(key = %self.key_name))]
    async fn unwrap_key(&self, wrapped: &[u8]) -> Result<DataKey, CryptoError> {
        let request = DecryptRequest {
            ciphertext: B64.encode(wrapped),
        };
        let response: DecryptResponse = self
            .rest
            .send(Method::POST, &self.url("decrypt"), &request)
            .await
            .map_err(|e| match e {
                crate::error::GcpProviderError::ServiceError(_) => CryptoError::DecryptionFailed,
                other => other.into(),
            })?;
        let raw = B64
            .decode(response.plaintext)
            .map_err(|e| CryptoError::InvalidFormat(format!("KMS plaintext is not base64: {e}")))?;
        DataKey::from_slice(&raw)
    }
}
