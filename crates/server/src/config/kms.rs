use serde::Deserialize;

/// Key-encryption key used for envelope encryption of stored drafts.
#[derive(Debug, Default, Deserialize)]
pub struct KmsConfig {
    /// `gcp-kms://projects/.../cryptoKeys/...` or `local-kms://<hex or
    /// base64 key>`.
    pub key_uri: Option<String>,
}
