//! Auth gate: Google sign-in through the hosted auth service, restricted to
//! the admin allow-list.
//!
//! The gate holds the identity of the admin that most recently established a
//! session (for `/api/auth/me`), but every protected request is checked on its
//! own bearer token through [`AuthGate::authorize`].

pub mod extract;
pub mod provider;
pub mod session;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::db::Store;
use crate::error::AppError;
use crate::events::{DashboardEvent, EventBus};
use crate::retry::with_session_retry;
use provider::IdentityProvider;
use session::SessionVerifier;

/// Seconds before expiry at which a held session is refreshed
const REFRESH_BUFFER_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminIdentity {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub given_name: String,
    pub family_name: String,
}

/// Tokens issued by the hosted auth service after the OAuth callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignInResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EstablishedSession {
    pub user: AdminIdentity,
    pub session: SessionTokens,
}

pub struct AuthGate {
    store: Arc<dyn Store>,
    verifier: SessionVerifier,
    provider: Arc<dyn IdentityProvider>,
    events: EventBus,
    redirect_url: String,
    current: RwLock<Option<AdminIdentity>>,
}

impl AuthGate {
    pub fn new(
        store: Arc<dyn Store>,
        verifier: SessionVerifier,
        provider: Arc<dyn IdentityProvider>,
        events: EventBus,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            verifier,
            provider,
            events,
            redirect_url: redirect_url.into(),
            current: RwLock::new(None),
        }
    }

    /// Adopt a session restored at startup, if any.
    pub async fn initialize(&self, session: Option<SessionTokens>) -> Option<AdminIdentity> {
        let session = session?;
        match self.establish(session).await {
            Ok(established) => Some(established.user),
            Err(e) => {
                tracing::warn!(error = %e, "stored session could not be restored");
                None
            }
        }
    }

    /// Validate a freshly issued session and make its holder the current user.
    ///
    /// A session that is expired or about to expire is refreshed once first.
    pub async fn establish(&self, session: SessionTokens) -> Result<EstablishedSession, AppError> {
        let tokens = &Mutex::new(session);

        let result = with_session_retry(
            move || async move {
                let access_token = tokens.lock().await.access_token.clone();
                self.validate(&access_token).await
            },
            move || self.refresh_held(tokens),
        )
        .await;

        match result {
            Ok(user) => {
                *self.current.write().await = Some(user.clone());
                tracing::info!(email = %user.email, "admin signed in");
                self.events.publish(DashboardEvent::AuthChanged {
                    user: Some(user.clone()),
                });
                let session = tokens.lock().await.clone();
                Ok(EstablishedSession { user, session })
            }
            Err(e) => {
                let was_signed_in = self.current.write().await.take().is_some();
                if was_signed_in {
                    self.events
                        .publish(DashboardEvent::AuthChanged { user: None });
                }
                Err(e)
            }
        }
    }

    async fn validate(&self, access_token: &str) -> Result<AdminIdentity, AppError> {
        let claims = self.verifier.decode(access_token)?;
        if claims.expires_within(REFRESH_BUFFER_SECS) {
            return Err(AppError::SessionExpired);
        }
        self.admit(access_token, claims.identity()).await
    }

    async fn refresh_held(&self, tokens: &Mutex<SessionTokens>) -> Result<(), AppError> {
        let refresh_token = tokens
            .lock()
            .await
            .refresh_token
            .clone()
            .ok_or(AppError::SessionExpired)?;
        let refreshed = self.provider.refresh_session(&refresh_token).await?;
        tracing::info!("session refreshed before validation");
        *tokens.lock().await = refreshed;
        Ok(())
    }

    /// Per-request check of a bearer token against the allow-list.
    pub async fn authorize(&self, access_token: &str) -> Result<AdminIdentity, AppError> {
        let claims = self.verifier.decode(access_token)?;
        self.admit(access_token, claims.identity()).await
    }

    async fn admit(
        &self,
        access_token: &str,
        identity: AdminIdentity,
    ) -> Result<AdminIdentity, AppError> {
        if identity.email.is_empty() {
            return Err(AppError::InvalidSession(
                "session carries no email".to_string(),
            ));
        }

        if self.verify_user_is_admin(&identity.email).await {
            return Ok(identity);
        }

        tracing::warn!(email = %identity.email, "non-admin session rejected");
        if let Err(e) = self.provider.revoke_session(access_token).await {
            tracing::error!(error = %e, email = %identity.email, "failed to revoke non-admin session");
        }
        Err(AppError::NotAdmin(identity.email))
    }

    /// Allow-list lookup. Lookup failures count as "not an admin".
    pub async fn verify_user_is_admin(&self, email: &str) -> bool {
        match self.store.is_admin(email).await {
            Ok(is_admin) => is_admin,
            Err(e) => {
                tracing::error!(error = %e, email = %email, "admin allow-list lookup failed");
                false
            }
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub async fn current_user(&self) -> Option<AdminIdentity> {
        self.current.read().await.clone()
    }

    pub fn sign_in(&self, redirect_to: Option<&str>) -> SignInResult {
        let redirect_to = redirect_to
            .filter(|r| !r.is_empty())
            .unwrap_or(self.redirect_url.as_str());

        match self.provider.authorize_url(redirect_to) {
            Ok(url) => SignInResult {
                success: true,
                url: Some(url),
                error: None,
            },
            Err(e) => {
                tracing::error!(error = %e, "failed to start Google sign-in");
                SignInResult {
                    success: false,
                    url: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Revoke the caller's session. The cached identity is cleared only when
    /// it belongs to the token's holder, even if the provider call fails.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let identity = self.verifier.decode(access_token)?.identity();
        let revoked = self.provider.revoke_session(access_token).await;

        let cleared = {
            let mut current = self.current.write().await;
            match current.as_ref() {
                Some(user) if user.id == identity.id && user.email == identity.email => {
                    current.take()
                }
                _ => None,
            }
        };

        match cleared {
            Some(user) => {
                tracing::info!(email = %user.email, "admin signed out");
                self.events
                    .publish(DashboardEvent::AuthChanged { user: None });
            }
            None => tracing::debug!(email = %identity.email, "session revoked"),
        }

        revoked
    }

    /// Dashboard events, including every `AuthChanged` this gate publishes
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }
}
