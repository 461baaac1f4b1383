use draftsync_lifecycle::DEFAULT_ATTACHMENT_TYPES;
use serde::Deserialize;

/// Uploaded attachments.
#[derive(Debug, Deserialize)]
pub struct AttachmentsConfig {
    /// Content types accepted on upload.
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_allowed_types() -> Vec<String> {
    DEFAULT_ATTACHMENT_TYPES.map(str::to_owned).to_vec()
}
