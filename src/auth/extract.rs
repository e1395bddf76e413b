//! Request gate for admin-only routes.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use super::AdminIdentity;
use crate::error::AppError;
use crate::state::AppState;

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|s| s.to_string())
}

/// An allow-listed admin, verified from the request's bearer token
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub identity: AdminIdentity,
    pub access_token: String,
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let access_token =
            extract_bearer_token(&parts.headers).ok_or(AppError::Unauthenticated)?;

        let identity = state.auth.authorize(&access_token).await?;

        Ok(AdminSession {
            identity,
            access_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn missing_or_malformed_header_yields_none() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert!(extract_bearer_token(&headers).is_none());
    }
}
