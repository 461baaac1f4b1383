//! Encrypted attachments for the authenticated subject, addressed by a
//! random id.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use draftsync_core::BlobId;
use serde::Serialize;
use uuid::Uuid;

use super::{AppState, subject};
use crate::error::ServerError;

/// Header carrying the original filename of an upload.
pub const FILENAME_HEADER: &str = "x-filename";

#[derive(Debug, Serialize)]
pub struct StoredAttachment {
    pub id: BlobId,
}

fn attachment_id(raw: &str) -> Result<BlobId, ServerError> {
    let id = Uuid::parse_str(raw)
        .map_err(|e| ServerError::BadRequest(format!("attachment id: {e}")))?;
    BlobId::parse(id.to_string()).map_err(|e| ServerError::BadRequest(e.to_string()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `POST /attachments`
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServerError> {
    let subject = subject(&headers)?;
    let content_type = header_str(&headers, header::CONTENT_TYPE)
        .ok_or_else(|| ServerError::BadRequest("missing content-type header".into()))?;
    let filename = header_str(&headers, FILENAME_HEADER);
    let id = state
        .drafts
        .store(&subject, content_type, filename, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(StoredAttachment { id })))
}

/// `GET /attachments/{id}`
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let subject = subject(&headers)?;
    let blob = attachment_id(&id)?;
    let document = state
        .drafts
        .retrieve_document(&subject, &blob)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("attachment {blob}")))?;

    let content_type = HeaderValue::from_str(document.content_type())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = document
        .filename()
        .and_then(|name| HeaderValue::from_str(&format!("attachment; filename=\"{name}\"")).ok());

    let mut response = (StatusCode::OK, document.data).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Some(disposition) = disposition {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    Ok(response)
}

/// `DELETE /attachments/{id}`
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ServerError> {
    let subject = subject(&headers)?;
    let blob = attachment_id(&id)?;
    if state.drafts.erase(&subject, &blob).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServerError::NotFound(format!("attachment {blob}")))
    }
}
