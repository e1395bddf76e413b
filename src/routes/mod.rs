/**
 * Routes Module
 * API route handlers
 */
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod auth;
pub mod blog;
pub mod codes;
pub mod events;
pub mod health;
pub mod redemptions;

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Success response (for sign-out)
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Body of bulk delete requests
#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<Uuid>,
}

/// Response for bulk deletes
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted: u64,
}
