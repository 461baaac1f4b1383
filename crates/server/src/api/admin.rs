//! Read-only view of the provisioned bucket wiring.

use axum::Json;
use axum::extract::{Path, State};
use draftsync_lifecycle::{InfraSection, InfraView};

use super::AppState;
use crate::error::ServerError;

/// `GET /admin/iac`
pub async fn describe_all(State(state): State<AppState>) -> Result<Json<InfraView>, ServerError> {
    describe(&state, InfraSection::All).await
}

/// `GET /admin/iac/{section}` -- `topics`, `subscriptions` or
/// `notifications`; anything else describes everything.
pub async fn describe_section(
    State(state): State<AppState>,
    Path(section): Path<String>,
) -> Result<Json<InfraView>, ServerError> {
    describe(&state, InfraSection::from_name(&section)).await
}

async fn describe(state: &AppState, section: InfraSection) -> Result<Json<InfraView>, ServerError> {
    let provisioner = state
        .provisioner
        .as_ref()
        .ok_or_else(|| ServerError::Unavailable("infrastructure admin is not configured".into()))?;
    Ok(Json(provisioner.describe(&state.bucket, section).await?))
}
