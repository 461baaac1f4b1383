//! Encrypted draft storage for the authenticated subject.
//!
//! Writing a draft produces a storage notification which the subscriber
//! turns into a user notification; these handlers never publish directly.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use draftsync_core::{BlobId, FormType};
use serde::Serialize;
use uuid::Uuid;

use super::{AppState, subject};
use crate::error::ServerError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDraft {
    pub draft_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftStatus {
    pub form_type: FormType,
    pub open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<Uuid>,
}

fn form(raw: &str) -> Result<FormType, ServerError> {
    raw.parse()
        .map_err(|e: draftsync_core::CoreError| ServerError::BadRequest(e.to_string()))
}

/// `PUT /drafts/{form_type}`
pub async fn put_draft(
    State(state): State<AppState>,
    Path(form_type): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServerError> {
    let subject = subject(&headers)?;
    let form_type = form(&form_type)?;
    let draft_id = state.drafts.store_draft(&subject, form_type, &body).await?;
    Ok((StatusCode::OK, Json(StoredDraft { draft_id })))
}

/// `GET /drafts/{form_type}`
pub async fn get_draft(
    State(state): State<AppState>,
    Path(form_type): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let subject = subject(&headers)?;
    let form_type = form(&form_type)?;
    let data = state
        .drafts
        .retrieve(&subject, &BlobId::for_form(form_type))
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("no {form_type} draft")))?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data).into_response())
}

/// `DELETE /drafts/{form_type}`
pub async fn delete_draft(
    State(state): State<AppState>,
    Path(form_type): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ServerError> {
    let subject = subject(&headers)?;
    let form_type = form(&form_type)?;
    if state
        .drafts
        .erase(&subject, &BlobId::for_form(form_type))
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServerError::NotFound(format!("no {form_type} draft")))
    }
}

/// `GET /drafts/{form_type}/status` -- whether a notification is open.
pub async fn draft_status(
    State(state): State<AppState>,
    Path(form_type): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DraftStatus>, ServerError> {
    let subject = subject(&headers)?;
    let form_type = form(&form_type)?;
    let open = state.store.open_drafts(&subject, form_type).await?;
    Ok(Json(DraftStatus {
        form_type,
        open: !open.is_empty(),
        draft_id: open.first().map(|r| r.draft_id),
    }))
}
