use axum::{
    body::Bytes,
    extract::{multipart::Field, rejection::QueryRejection, Multipart, Query, State},
    http::StatusCode,
    Extension,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::document::{parse_tags, storage_path};
use crate::database::models::{Document, DocumentStatus, DocumentType};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

const FILE_FIELD: &str = "file";
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub document_type: DocumentType,
    pub document_title: String,
    pub notes: Option<String>,
    /// Comma separated
    pub tags: Option<String>,
}

#[derive(Debug)]
pub(crate) struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// POST /documents - multipart `file` plus metadata in the query string
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    query: Result<Query<UploadQuery>, QueryRejection>,
    mut multipart: Multipart,
) -> ApiResult<Document> {
    let Query(query) = query?;
    let max_bytes = state.config.uploads.max_upload_bytes;
    let file = read_file_field(&mut multipart, max_bytes).await?;

    let doc_id = Uuid::new_v4().to_string();
    let path = storage_path(&user.uid, &doc_id, &file.file_name);
    let file_size = file.bytes.len() as u64;

    state.blobs.put(&path, file.bytes, &file.content_type).await?;

    let now = Utc::now();
    let document = Document {
        doc_id: doc_id.clone(),
        user_id: user.uid.clone(),
        storage_path: path.clone(),
        doc_type: query.document_type,
        status: DocumentStatus::PendingValidation,
        document_title: query.document_title,
        file_name: file.file_name,
        file_size,
        mime_type: file.content_type,
        notes: query.notes,
        tags: parse_tags(query.tags.as_deref()),
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = state.documents().insert(&doc_id, &document).await {
        // Don't leave an orphaned blob behind a failed metadata write
        if let Err(cleanup) = state.blobs.delete(&path).await {
            warn!("Failed to remove orphaned blob {}: {}", path, cleanup);
        }
        return Err(e.into());
    }

    info!("Uploaded document {} ({} bytes) for user {}", doc_id, file_size, user.uid);
    Ok(ApiResponse::created(document))
}

/// Find the `file` part and buffer it, refusing anything over `max_bytes`
pub(crate) async fn read_file_field(multipart: &mut Multipart, max_bytes: usize) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = match field.file_name() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => return Err(ApiError::bad_request("No file provided")),
        };
        let content_type = field
            .content_type()
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();
        let bytes = read_limited(field, max_bytes).await?;

        return Ok(UploadedFile { file_name, content_type, bytes });
    }

    Err(ApiError::bad_request("No file provided"))
}

async fn read_limited(mut field: Field<'_>, max_bytes: usize) -> Result<Bytes, ApiError> {
    let mut buffer = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if buffer.len() + chunk.len() > max_bytes {
            return Err(too_large(max_bytes));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buffer))
}

fn too_large(max_bytes: usize) -> ApiError {
    ApiError::bad_request(format!("File size exceeds {}MB limit", max_bytes / (1024 * 1024)))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    // The body limit trips before our own check for grossly oversized uploads
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::bad_request("File size exceeds upload limit")
    } else {
        ApiError::bad_request(format!("Invalid multipart body: {}", err.body_text()))
    }
}
