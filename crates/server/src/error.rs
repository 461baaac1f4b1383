use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use draftsync_crypto::CryptoError;
use draftsync_lifecycle::LifecycleError;
use draftsync_state::StateError;
use thiserror::Error;

/// Errors raised while starting or serving draftsync.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener or reading the config file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A lifecycle operation failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The draft record store failed.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// The request was malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A collaborator needed for the request is not configured.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<CryptoError> for ServerError {
    fn from(e: CryptoError) -> Self {
        Self::Config(format!("key management: {e}"))
    }
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Lifecycle(
                LifecycleError::Infrastructure(_)
                | LifecycleError::Publish(_)
                | LifecycleError::Storage(_),
            ) => StatusCode::BAD_GATEWAY,
            Self::Lifecycle(LifecycleError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Lifecycle(LifecycleError::Unprocessable(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Lifecycle(LifecycleError::UnsupportedContentType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            Self::Lifecycle(LifecycleError::Crypto(e)) if e.is_retryable() => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Config(_)
            | Self::Io(_)
            | Self::State(_)
            | Self::Lifecycle(LifecycleError::Persistence(_) | LifecycleError::Crypto(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use draftsync_provider::ProviderError;

    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ServerError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::from(LifecycleError::Storage(ProviderError::Connection("x".into())))
                .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServerError::from(LifecycleError::Timeout { operation: "object get" }).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ServerError::from(LifecycleError::Crypto(CryptoError::DecryptionFailed)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServerError::from(LifecycleError::Crypto(CryptoError::KmsUnavailable("x".into())))
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServerError::from(LifecycleError::UnsupportedContentType("text/html".into())).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }

    #[tokio::test]
    async fn response_body_is_json_error() {
        let response = ServerError::NotFound("draft".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "not found: draft");
    }
}
