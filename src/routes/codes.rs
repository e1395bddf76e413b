/**
 * Promo Code Routes
 * Bulk add, filtered listing, deletion and statistics
 */
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::{DeleteResponse, IdsRequest};
use crate::auth::extract::AdminSession;
use crate::db::models::{CodeType, Region};
use crate::db::CodeFilter;
use crate::error::AppError;
use crate::state::AppState;

/// Query parameters for GET /api/codes
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeListQuery {
    #[serde(rename = "type")]
    pub code_type: Option<CodeType>,
    pub region: Option<Region>,
    pub is_used: Option<bool>,
    pub search: Option<String>,
}

impl From<CodeListQuery> for CodeFilter {
    fn from(q: CodeListQuery) -> Self {
        CodeFilter {
            code_type: q.code_type,
            region: q.region,
            is_used: q.is_used,
            search: q.search,
        }
    }
}

/// Request body for POST /api/codes
#[derive(Debug, Deserialize)]
pub struct AddCodesRequest {
    pub codes: Vec<String>,
    #[serde(rename = "type")]
    pub code_type: CodeType,
    pub region: Region,
}

/// GET /api/codes - List codes, newest first
pub async fn list_codes(
    session: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<CodeListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let codes = state
        .codes
        .get_promo_codes(&session.identity, &query.into())
        .await?;
    Ok(Json(codes))
}

/// POST /api/codes - Add a batch of codes with one type and region
pub async fn add_codes(
    session: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<AddCodesRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.codes.iter().all(|c| c.trim().is_empty()) {
        return Err(AppError::Validation(
            "Please enter at least one promo code".to_string(),
        ));
    }

    let result = state
        .codes
        .add_promo_codes(
            &session.identity,
            &payload.codes,
            payload.code_type,
            payload.region,
        )
        .await?;

    let status = if result.success.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(result)))
}

/// DELETE /api/codes - Delete codes by id
pub async fn delete_codes(
    session: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<IdsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state
        .codes
        .delete_promo_codes(&session.identity, &payload.ids)
        .await?;
    Ok(Json(DeleteResponse {
        success: true,
        deleted,
    }))
}

/// GET /api/codes/stats - Counts, histograms and monthly revenue
pub async fn code_stats(
    session: AdminSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let stats = state.codes.get_promo_code_stats(&session.identity).await?;
    Ok(Json(stats))
}
