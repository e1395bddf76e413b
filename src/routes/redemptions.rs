/**
 * Redemption Routes
 * Redeemed code listing, verification, restore and cascade delete
 */
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{IdsRequest, SuccessResponse};
use crate::auth::extract::AdminSession;
use crate::error::AppError;
use crate::services::redemptions::RedeemedFilter;
use crate::state::AppState;

/// Request body for PATCH /api/redemptions/{id}/verified
#[derive(Debug, Deserialize)]
pub struct VerifiedRequest {
    pub verified: bool,
}

/// GET /api/redemptions - Redeemed codes, newest first
pub async fn list_redeemed(
    session: AdminSession,
    State(state): State<AppState>,
    Query(filter): Query<RedeemedFilter>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state
        .redemptions
        .get_redeemed_codes(&session.identity, &filter)
        .await?;
    Ok(Json(rows))
}

/// PATCH /api/redemptions/{id}/verified
pub async fn set_verified(
    session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifiedRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .redemptions
        .toggle_verified_status(&session.identity, id, payload.verified)
        .await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/redemptions/{id}/restore - Return the code to the available pool
pub async fn restore(
    session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let restored = state
        .redemptions
        .restore_redeemed_code(&session.identity, id)
        .await?;
    Ok(Json(restored))
}

/// DELETE /api/redemptions - Delete redemptions and their codes
pub async fn delete_redeemed(
    session: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<IdsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .redemptions
        .delete_redeemed_codes(&session.identity, &payload.ids)
        .await?;
    Ok(Json(outcome))
}

/// DELETE /api/redemptions/{id}
pub async fn delete_one(
    session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .redemptions
        .delete_redeemed_codes(&session.identity, &[id])
        .await?;
    if outcome.deleted_requests == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Json(outcome))
}
