//! Session token verification for tokens issued by the hosted auth service.

use chrono::Utc;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::AdminIdentity;
use crate::error::AppError;

/// Audience the hosted auth service stamps on signed-in user tokens
const SESSION_AUDIENCE: &str = "authenticated";

/// Provider profile claims copied into the session token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
    pub avatar_url: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub surname: Option<String>,
}

/// Session JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl SessionClaims {
    pub fn expires_within(&self, secs: i64) -> bool {
        self.exp - Utc::now().timestamp() < secs
    }

    /// Map provider claims onto the dashboard identity
    pub fn identity(&self) -> AdminIdentity {
        let meta = &self.user_metadata;
        let email = self.email.clone().unwrap_or_default();

        let name = meta
            .full_name
            .clone()
            .or_else(|| meta.name.clone())
            .or_else(|| {
                meta.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        AdminIdentity {
            id: self.sub.clone(),
            email,
            name,
            picture: meta
                .picture
                .clone()
                .or_else(|| meta.avatar_url.clone())
                .unwrap_or_default(),
            given_name: meta.given_name.clone().unwrap_or_default(),
            family_name: meta
                .family_name
                .clone()
                .or_else(|| meta.surname.clone())
                .unwrap_or_default(),
        }
    }
}

pub struct SessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl SessionVerifier {
    pub fn new(jwt_secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[SESSION_AUDIENCE]);
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Verify and decode a session token; expiry maps to `SessionExpired`.
    pub fn decode(&self, token: &str) -> Result<SessionClaims, AppError> {
        decode::<SessionClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::SessionExpired,
                _ => AppError::InvalidSession(e.to_string()),
            })
    }
}

#[cfg(test)]
pub(crate) mod test_tokens {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    pub const SECRET: &str = "test-session-secret";

    /// Mint a session token for `email` that expires `ttl_secs` from now
    pub fn token_for(email: &str, ttl_secs: i64) -> String {
        let exp = chrono::Utc::now().timestamp() + ttl_secs;
        let claims = json!({
            "sub": format!("user-{}", email),
            "email": email,
            "aud": "authenticated",
            "exp": exp,
            "user_metadata": {
                "full_name": "Test Admin",
                "avatar_url": "https://example.com/avatar.png",
                "given_name": "Test",
                "surname": "Admin"
            }
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_tokens::{token_for, SECRET};
    use super::*;

    #[test]
    fn valid_token_maps_identity() {
        let verifier = SessionVerifier::new(SECRET);
        let claims = verifier.decode(&token_for("ops@example.com", 3600)).unwrap();
        let identity = claims.identity();

        assert_eq!(identity.email, "ops@example.com");
        assert_eq!(identity.name, "Test Admin");
        assert_eq!(identity.picture, "https://example.com/avatar.png");
        assert_eq!(identity.family_name, "Admin");
        assert!(!claims.expires_within(60));
    }

    #[test]
    fn expired_token_is_session_expired() {
        let verifier = SessionVerifier::new(SECRET);
        let err = verifier.decode(&token_for("ops@example.com", -120)).unwrap_err();
        assert!(matches!(err, AppError::SessionExpired));
    }

    #[test]
    fn wrong_secret_is_invalid_session() {
        let verifier = SessionVerifier::new("another-secret");
        let err = verifier.decode(&token_for("ops@example.com", 3600)).unwrap_err();
        assert!(matches!(err, AppError::InvalidSession(_)));
    }

    #[test]
    fn name_falls_back_to_metadata_email_local_part() {
        let claims = SessionClaims {
            sub: "1".to_string(),
            email: Some("jane@example.com".to_string()),
            exp: 0,
            user_metadata: UserMetadata {
                email: Some("jane@example.com".to_string()),
                ..Default::default()
            },
        };
        let identity = claims.identity();
        assert_eq!(identity.name, "jane");
        assert_eq!(identity.picture, "");
    }
}
