// Document handlers: metadata lives in the record store, bytes in the blob store.
mod stats;
mod upload;

pub use stats::stats;
pub use upload::{upload, UploadQuery};

use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::header,
    response::Response,
    Extension, Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::app::AppState;
use crate::database::models::{Document, DocumentUpdate};
use crate::database::Filter;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

use super::ensure_owner;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    fn window(&self) -> Result<(usize, usize), ApiError> {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ApiError::invalid_field("limit", format!("must be between 1 and {}", MAX_PAGE_SIZE)));
        }
        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err(ApiError::invalid_field("offset", "must not be negative"));
        }
        Ok((limit as usize, offset as usize))
    }
}

/// GET /documents?limit&offset - newest first
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<Document>> {
    let Query(query) = query?;
    let (limit, offset) = query.window()?;
    let filter = Filter::new()
        .where_eq("user_id", user.uid.as_str())
        .order_desc("created_at")
        .order_fallback("uploaded_at")
        .limit(limit)
        .offset(offset);

    let documents = state.documents().select_any(&filter).await?;
    Ok(ApiResponse::success(documents))
}

/// GET /documents/:doc_id
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(doc_id): Path<String>,
) -> ApiResult<Document> {
    let document = load_owned(&state, &user, &doc_id).await?;
    Ok(ApiResponse::success(document))
}

/// PUT /documents/:doc_id - title, notes and tags only
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(doc_id): Path<String>,
    Json(payload): Json<DocumentUpdate>,
) -> ApiResult<Document> {
    load_owned(&state, &user, &doc_id).await?;

    let document = state
        .documents()
        .patch(&doc_id, payload.into_fields())
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;
    Ok(ApiResponse::success(document))
}

/// DELETE /documents/:doc_id - blob first, then metadata
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(doc_id): Path<String>,
) -> ApiResult<()> {
    let document = load_owned(&state, &user, &doc_id).await?;

    match state.blobs.exists(&document.storage_path).await {
        Ok(true) => {
            if let Err(e) = state.blobs.delete(&document.storage_path).await {
                warn!("Failed to delete blob {} for document {}: {}", document.storage_path, doc_id, e);
            }
        }
        Ok(false) => {}
        Err(e) => warn!("Could not check blob {} for document {}: {}", document.storage_path, doc_id, e),
    }

    state.documents().delete(&doc_id).await?;
    info!("Deleted document {} for user {}", doc_id, user.uid);
    Ok(ApiResponse::no_content())
}

/// GET /documents/:doc_id/download - raw bytes as an attachment
pub async fn download(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(doc_id): Path<String>,
) -> Result<Response, ApiError> {
    let document = load_owned(&state, &user, &doc_id).await?;
    let bytes = state.blobs.get(&document.storage_path).await?;

    Response::builder()
        .header(header::CONTENT_TYPE, document.mime_type.as_str())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", attachment_name(&document.file_name)),
        )
        .body(Body::from(bytes))
        .map_err(|e| ApiError::internal_server_error(format!("Failed to build download response: {}", e)))
}

/// Fetch → 404 → ownership check → 403
async fn load_owned(state: &AppState, user: &AuthUser, doc_id: &str) -> Result<Document, ApiError> {
    let document = state
        .documents()
        .select_one(doc_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;

    ensure_owner(user, &document.user_id, "Access denied: Document does not belong to current user")?;
    Ok(document)
}

/// Printable ASCII only, no quotes or backslashes
fn attachment_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}
