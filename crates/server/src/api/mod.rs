pub mod admin;
pub mod attachments;
pub mod drafts;
pub mod health;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use draftsync_core::SubjectId;
use draftsync_lifecycle::{BucketConfig, EnvelopeCryptoStore, InfraProvisioner, LifecycleMetrics};
use draftsync_state::DraftStore;
use tower_http::trace::TraceLayer;

use crate::error::ServerError;

/// Header carrying the authenticated subject id, set by the fronting proxy.
pub const SUBJECT_HEADER: &str = "x-subject-id";

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<LifecycleMetrics>,
    pub store: Arc<dyn DraftStore>,
    /// Encrypted draft and attachment storage.
    pub drafts: Arc<EnvelopeCryptoStore>,
    /// Optional provisioner (None when running without Google Cloud).
    pub provisioner: Option<Arc<InfraProvisioner>>,
    pub bucket: Arc<BucketConfig>,
}

/// Build the Axum router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .route("/admin/iac", get(admin::describe_all))
        .route("/admin/iac/{section}", get(admin::describe_section))
        .route(
            "/drafts/{form_type}",
            get(drafts::get_draft)
                .put(drafts::put_draft)
                .delete(drafts::delete_draft),
        )
        .route("/drafts/{form_type}/status", get(drafts::draft_status))
        .route("/attachments", post(attachments::upload))
        .route(
            "/attachments/{id}",
            get(attachments::download).delete(attachments::remove),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The authenticated subject of a request.
pub(crate) fn subject(headers: &HeaderMap) -> Result<SubjectId, ServerError> {
    let raw = headers
        .get(SUBJECT_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::BadRequest(format!("missing {SUBJECT_HEADER} header")))?;
    SubjectId::parse(raw).map_err(|e| ServerError::BadRequest(e.to_string()))
}
