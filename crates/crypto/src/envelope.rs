use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::error::CryptoError;
use crate::kek::KeyEncryptionKey;
use crate::key::DataKey;

/// Name of the data-key template, recorded alongside stored objects.
pub const KEY_TEMPLATE: &str = "AES256_GCM";

const LEN_PREFIX: usize = 4;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// AEAD primitive producing envelope ciphertexts.
///
/// Built once at startup around the configured key-encryption key and shared
/// by reference afterwards.
#[derive(Clone)]
pub struct EnvelopeAead {
    kek: Arc<dyn KeyEncryptionKey>,
}

impl EnvelopeAead {
    pub fn new(kek: Arc<dyn KeyEncryptionKey>) -> Self {
        Self { kek }
    }

    pub fn key_uri(&self) -> &str {
        self.kek.key_uri()
    }

    /// Encrypt `plaintext` under a fresh data key, authenticating `aad`.
    pub async fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let data_key = DataKey::generate();
        let wrapped = self.kek.wrap_key(&data_key).await?;
        let wrapped_len = u32::try_from(wrapped.len())
            .map_err(|_| CryptoError::EncryptionFailed("wrapped key too large".to_owned()))?;

        let cipher = Aes256Gcm::new_from_slice(data_key.as_bytes())
            .map_err(|e| CryptoError::InvalidKey(format!("invalid AES key: {e}")))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = cipher
            .encrypt(&nonce, Payload { msg: plaintext, aad })
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut out = Vec::with_capacity(LEN_PREFIX + wrapped.len() + NONCE_LEN + sealed.len());
        out.extend_from_slice(&wrapped_len.to_be_bytes());
        out.extend_from_slice(&wrapped);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypt an envelope ciphertext. Fails unless `aad` is byte-identical
    /// to the associated data used at encryption.
    pub async fn decrypt(&self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let (wrapped, nonce, sealed) = split(ciphertext)?;
        let data_key = self.kek.unwrap_key(wrapped).await?;
        let cipher = Aes256Gcm::new_from_slice(data_key.as_bytes())
            .map_err(|e| CryptoError::InvalidKey(format!("invalid AES key: {e}")))?;
        cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: sealed, aad })
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

fn split(ciphertext: &[u8]) -> Result<(&[u8], &[u8], &[u8]), CryptoError> {
    let Some((prefix, rest)) = ciphertext.split_first_chunk::<LEN_PREFIX>() else {
        return Err(CryptoError::InvalidFormat("missing key length".to_owned()));
    };
    let wrapped_len = u32::from_be_bytes(*prefix) as usize;
    if wrapped_len == 0 || rest.len() < wrapped_len + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::InvalidFormat(format!(
            "wrapped key length {wrapped_len} does not fit {} remaining bytes",
            rest.len()
        )));
    }
    let (wrapped, rest) = rest.split_at(wrapped_len);
    let (nonce, sealed) = rest.split_at(NONCE_LEN);
    Ok((wrapped, nonce, sealed))
}
