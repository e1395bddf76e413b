/**
 * Authentication Routes
 * Google sign-in through the hosted auth service, gated by the admin allow-list
 */
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::SuccessResponse;
use crate::auth::extract::extract_bearer_token;
use crate::auth::{AdminIdentity, SessionTokens};
use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInQuery {
    pub redirect_to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub authenticated: bool,
    pub user: Option<AdminIdentity>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/auth/sign-in - URL that starts the Google OAuth flow.
/// Failures are reported in the body, never as an error status.
pub async fn sign_in(
    State(state): State<AppState>,
    Query(query): Query<SignInQuery>,
) -> impl IntoResponse {
    Json(state.auth.sign_in(query.redirect_to.as_deref()))
}

/// POST /api/auth/session - Adopt the tokens returned by the OAuth callback
pub async fn establish_session(
    State(state): State<AppState>,
    Json(tokens): Json<SessionTokens>,
) -> Result<impl IntoResponse, AppError> {
    let established = state.auth.establish(tokens).await?;
    Ok(Json(established))
}

/// GET /api/auth/me - Identity behind the bearer token, if any
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let Some(token) = extract_bearer_token(&headers) else {
        return Ok(Json(MeResponse {
            authenticated: false,
            user: None,
        }));
    };

    let user = state.auth.authorize(&token).await?;
    Ok(Json(MeResponse {
        authenticated: true,
        user: Some(user),
    }))
}

/// POST /api/auth/sign-out - Revoke the caller's session at the provider
pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = extract_bearer_token(&headers).ok_or(AppError::Unauthenticated)?;
    state.auth.sign_out(&token).await?;
    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::MockIdentityProvider;
    use crate::auth::session::test_tokens::token_for;
    use crate::db::memory::MemoryStore;
    use crate::routes::test_support::{admin_token, send, test_state, test_state_with};
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn sign_in_returns_provider_url() {
        let (state, _) = test_state();
        let app = crate::create_app(state);

        let (status, body) = send(
            app,
            Method::GET,
            "/api/auth/sign-in?redirectTo=http://localhost:5173/admin",
            None,
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["url"]
            .as_str()
            .unwrap()
            .ends_with("redirect_to=http://localhost:5173/admin"));
    }

    #[tokio::test]
    async fn session_for_admin_is_established() {
        let (state, _) = test_state();
        let app = crate::create_app(state.clone());

        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/session",
            None,
            Some(json!({ "accessToken": admin_token() })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "admin@example.com");
        assert!(state.auth.is_authenticated().await);
    }

    #[tokio::test]
    async fn session_for_non_admin_is_forbidden() {
        let (state, _) = test_state();
        let app = crate::create_app(state.clone());

        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/session",
            None,
            Some(json!({ "accessToken": token_for("intruder@example.com", 3600) })),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"].as_str().unwrap().contains("intruder@example.com"));
        assert!(!state.auth.is_authenticated().await);
    }

    #[tokio::test]
    async fn me_without_token_is_anonymous() {
        let (state, _) = test_state();
        let (status, body) =
            send(crate::create_app(state), Method::GET, "/api/auth/me", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["authenticated"], false);
        assert!(body["user"].is_null());
    }

    #[tokio::test]
    async fn me_with_expired_token_is_unauthorized() {
        let (state, _) = test_state();
        let expired = token_for("admin@example.com", -300);
        let (status, _) = send(
            crate::create_app(state),
            Method::GET,
            "/api/auth/me",
            Some(&expired),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn sign_out_propagates_provider_failure() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_revoke_session()
            .returning(|_| Err(AppError::Provider("logout endpoint down".into())));
        let store = Arc::new(MemoryStore::with_admins(["admin@example.com"]));
        let state = test_state_with(store, provider);

        let (status, body) = send(
            crate::create_app(state),
            Method::POST,
            "/api/auth/sign-out",
            Some(&admin_token()),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Identity provider error");
    }

    #[tokio::test]
    async fn sign_out_succeeds() {
        let (state, _) = test_state();
        let (status, body) = send(
            crate::create_app(state),
            Method::POST,
            "/api/auth/sign-out",
            Some(&admin_token()),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn anonymous_sign_out_keeps_admin_signed_in() {
        let (state, _) = test_state();
        state
            .auth
            .establish(SessionTokens {
                access_token: admin_token(),
                refresh_token: None,
                expires_at: None,
            })
            .await
            .unwrap();
        let mut rx = state.auth.subscribe();

        let (status, _) = send(
            crate::create_app(state.clone()),
            Method::POST,
            "/api/auth/sign-out",
            None,
            None,
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(state.auth.is_authenticated().await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sign_out_clears_signed_in_admin() {
        let (state, _) = test_state();
        let token = admin_token();
        state
            .auth
            .establish(SessionTokens {
                access_token: token.clone(),
                refresh_token: None,
                expires_at: None,
            })
            .await
            .unwrap();

        let (status, _) = send(
            crate::create_app(state.clone()),
            Method::POST,
            "/api/auth/sign-out",
            Some(&token),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(!state.auth.is_authenticated().await);
    }
}
