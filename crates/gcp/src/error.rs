use draftsync_crypto::CryptoError;
use draftsync_provider::ProviderError;
use thiserror::Error;

/// Failures of Google Cloud calls, before they are mapped onto the
/// provider or crypto taxonomy.
#[derive(Debug, Error)]
pub enum GcpProviderError {
    /// Any other error reported by the service.
    #[error("GCP service error: {0}")]
    ServiceError(String),

    /// The addressed resource does not exist.
    #[error("GCP resource not found: {0}")]
    NotFound(String),

    /// The resource being created already exists.
    #[error("GCP resource already exists: {0}")]
    AlreadyExists(String),

    /// Quota or rate limit hit.
    #[error("GCP request throttled")]
    Throttled,

    /// Transport failure or a 5xx answer.
    #[error("GCP connection error: {0}")]
    Connection(String),

    /// The request timed out.
    #[error("GCP request timed out")]
    Timeout,

    /// A response body could not be decoded.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// No usable token or the token was rejected.
    #[error("credential error: {0}")]
    CredentialError(String),

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl From<GcpProviderError> for ProviderError {
    fn from(err: GcpProviderError) -> Self {
        match err {
            GcpProviderError::ServiceError(msg) => ProviderError::ExecutionFailed(msg),
            GcpProviderError::NotFound(msg) => ProviderError::NotFound(msg),
            GcpProviderError::AlreadyExists(msg) => ProviderError::AlreadyExists(msg),
            GcpProviderError::Throttled => ProviderError::RateLimited,
            GcpProviderError::Connection(msg) => ProviderError::Connection(msg),
            GcpProviderError::Timeout => ProviderError::Timeout(std::time::Duration::from_secs(30)),
            GcpProviderError::InvalidPayload(msg) => ProviderError::Serialization(msg),
            GcpProviderError::CredentialError(msg) | GcpProviderError::Configuration(msg) => {
                ProviderError::Configuration(msg)
            }
        }
    }
}

impl From<GcpProviderError> for CryptoError {
    fn from(err: GcpProviderError) -> Self {
        match err {
            GcpProviderError::Configuration(msg) | GcpProviderError::CredentialError(msg) => {
                CryptoError::InvalidKeyUri(msg)
            }
            GcpProviderError::InvalidPayload(msg) => CryptoError::InvalidFormat(msg),
            other => CryptoError::KmsUnavailable(other.to_string()),
        }
    }
}

const THROTTLE_MARKERS: &[&str] = &["429", "throttl", "rate exceed", "too many", "resource_exhausted"];
const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out", "deadline_exceeded"];
const EXISTS_MARKERS: &[&str] = &["already_exists", "already exists"];
const MISSING_MARKERS: &[&str] = &["not_found", "not found", "404"];
const NETWORK_MARKERS: &[&str] = &["connect", "dns", "network", "unavailable"];

/// Map an SDK error message onto a [`GcpProviderError`] by the status words
/// Google clients embed in their messages.
pub fn classify_gcp_error(error_str: &str) -> GcpProviderError {
    let lower = error_str.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));
    if has(THROTTLE_MARKERS) {
        GcpProviderError::Throttled
    } else if has(TIMEOUT_MARKERS) {
        GcpProviderError::Timeout
    } else if has(EXISTS_MARKERS) {
        GcpProviderError::AlreadyExists(error_str.to_owned())
    } else if has(MISSING_MARKERS) {
        GcpProviderError::NotFound(error_str.to_owned())
    } else if has(NETWORK_MARKERS) {
        GcpProviderError::Connection(error_str.to_owned())
    } else {
        GcpProviderError::ServiceError(error_str.to_owned())
    }
}

/// Classify a non-success HTTP response from a Google REST API.
pub fn classify_status(status: u16, body: &str) -> GcpProviderError {
    let detail = format!("HTTP {status}: {}", body.trim());
    match status {
        404 => GcpProviderError::NotFound(detail),
        409 => GcpProviderError::AlreadyExists(detail),
        429 => GcpProviderError::Throttled,
        408 | 504 => GcpProviderError::Timeout,
        401 | 403 => GcpProviderError::CredentialError(detail),
        500..=599 => GcpProviderError::Connection(detail),
        _ => GcpProviderError::ServiceError(detail),
    }
}

/// Map a transport-level `reqwest` failure.
pub(crate) fn classify_transport(err: &reqwest::Error) -> GcpProviderError {
    if err.is_timeout() {
        GcpProviderError::Timeout
    } else if err.is_connect() || err.is_request() {
        GcpProviderError::Connection(err.to_string())
    } else if err.is_decode() {
        GcpProviderError::InvalidPayload(err.to_string())
    } else {
        classify_gcp_error(&err.to_string())
    }
}
