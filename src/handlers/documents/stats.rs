use axum::{extract::State, Extension};
use chrono::Utc;

use crate::app::AppState;
use crate::database::models::DocumentStats;
use crate::database::Filter;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// GET /documents/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<DocumentStats> {
    let filter = Filter::new().where_eq("user_id", user.uid.as_str());
    let documents = state.documents().select_any(&filter).await?;

    Ok(ApiResponse::success(DocumentStats::compute(&documents, Utc::now())))
}
