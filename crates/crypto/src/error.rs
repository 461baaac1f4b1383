use thiserror::Error;

/// Errors that can occur during envelope encryption and decryption.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The provided key material is not valid (wrong length or encoding).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The key URI does not name a supported key-management backend.
    #[error("invalid key uri: {0}")]
    InvalidKeyUri(String),

    /// The ciphertext is malformed.
    #[error("invalid ciphertext: {0}")]
    InvalidFormat(String),

    /// Decryption failed: wrong key, wrong associated data, or corrupted data.
    #[error("decryption failed (wrong key, associated data or corrupted data)")]
    DecryptionFailed,

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// The remote key-management service could not be reached or refused
    /// the request.
    #[error("key management service unavailable: {0}")]
    KmsUnavailable(String),
}

impl CryptoError {
    /// Returns `true` if the error is transient and the operation may succeed
    /// on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::KmsUnavailable(_))
    }
}
