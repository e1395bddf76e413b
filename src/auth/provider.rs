//! Client for the hosted auth service that fronts the Google OAuth provider.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::SessionTokens;
use crate::error::AppError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to for Google sign-in
    fn authorize_url(&self, redirect_to: &str) -> Result<String, AppError>;

    /// Exchange a refresh token for a new session
    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, AppError>;

    /// Revoke the session behind an access token
    async fn revoke_session(&self, access_token: &str) -> Result<(), AppError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct HostedAuth {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl HostedAuth {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }
}

#[async_trait]
impl IdentityProvider for HostedAuth {
    fn authorize_url(&self, redirect_to: &str) -> Result<String, AppError> {
        Url::parse_with_params(
            &self.endpoint("authorize"),
            &[
                ("provider", "google"),
                ("redirect_to", redirect_to),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map(String::from)
        .map_err(|e| AppError::Provider(format!("invalid auth URL: {}", e)))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, AppError> {
        let response = self
            .client
            .post(self.endpoint("token?grant_type=refresh_token"))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "session refresh request failed");
                AppError::Provider(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            tracing::warn!(status = %status, "refresh token rejected");
            return Err(AppError::SessionExpired);
        }
        if !status.is_success() {
            return Err(AppError::Provider(format!(
                "session refresh returned {}",
                status
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("invalid refresh response: {}", e)))?;

        let expires_at = body.expires_at.or_else(|| {
            body.expires_in
                .map(|secs| chrono::Utc::now().timestamp() + secs)
        });

        Ok(SessionTokens {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_at,
        })
    }

    async fn revoke_session(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.endpoint("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "sign-out request failed");
                AppError::Provider(e.to_string())
            })?;

        let status = response.status();
        // An already-invalid session counts as revoked
        if status.is_success() || status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND
        {
            Ok(())
        } else {
            Err(AppError::Provider(format!("sign-out returned {}", status)))
        }
    }
}
