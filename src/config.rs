//! Startup configuration, read once from the environment (after `.env`).

use std::net::SocketAddr;
use std::str::FromStr;

use crate::auth::SessionTokens;
use crate::error::StartupError;
use crate::logging::LogConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local tables, for local development without a database
    Memory,
}

impl FromStr for StoreBackend {
    type Err = StartupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(StartupError::Config(format!(
                "STORE_BACKEND must be 'postgres' or 'memory', got '{}'",
                other
            ))),
        }
    }
}

/// Hosted auth service settings
#[derive(Clone)]
pub struct AuthConfig {
    pub url: String,
    pub anon_key: String,
    pub jwt_secret: String,
    /// Where the browser lands after Google sign-in unless the caller asks otherwise
    pub redirect_url: String,
    /// Session persisted from an earlier run, adopted at startup
    pub session_access_token: Option<String>,
    pub session_refresh_token: Option<String>,
}

impl AuthConfig {
    pub fn stored_session(&self) -> Option<SessionTokens> {
        let access_token = self.session_access_token.clone()?;
        Some(SessionTokens {
            access_token,
            refresh_token: self.session_refresh_token.clone(),
            expires_at: None,
        })
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field("jwt_secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url)
            .field(
                "stored_session",
                &self.session_access_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub run_migrations: bool,
    pub auth: AuthConfig,
    /// Price of one verified redemption in the revenue figure
    pub promo_unit_price: u64,
    /// Allow-list seeded into the memory backend
    pub memory_admins: Vec<String>,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3001,
            store_backend: StoreBackend::Postgres,
            run_migrations: true,
            auth: AuthConfig {
                url: String::new(),
                anon_key: String::new(),
                jwt_secret: String::new(),
                redirect_url: "http://localhost:5173".to_string(),
                session_access_token: None,
                session_refresh_token: None,
            },
            promo_unit_price: 15,
            memory_admins: Vec::new(),
            log: LogConfig::default(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, StartupError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| StartupError::Config(format!("{} has an invalid value: '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, StartupError> {
        let defaults = Self::default();
        let environment = env_or("ENVIRONMENT", &defaults.environment);
        let is_production = environment == "production";

        let store_backend = match std::env::var("STORE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.store_backend,
        };

        let memory_admins = std::env::var("MEMORY_ADMIN_EMAILS")
            .map(|s| {
                s.split(',')
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            host: env_or("HOST", &defaults.host),
            port: parse_env("PORT", defaults.port)?,
            store_backend,
            run_migrations: parse_env("DB_RUN_MIGRATIONS", defaults.run_migrations)?,
            auth: AuthConfig {
                url: env_or("AUTH_URL", &defaults.auth.url),
                anon_key: env_or("AUTH_ANON_KEY", &defaults.auth.anon_key),
                jwt_secret: env_or("AUTH_JWT_SECRET", &defaults.auth.jwt_secret),
                redirect_url: env_or("AUTH_REDIRECT_URL", &defaults.auth.redirect_url),
                session_access_token: non_empty_env("AUTH_SESSION_ACCESS_TOKEN"),
                session_refresh_token: non_empty_env("AUTH_SESSION_REFRESH_TOKEN"),
            },
            promo_unit_price: parse_env("PROMO_UNIT_PRICE", defaults.promo_unit_price)?,
            memory_admins,
            log: LogConfig::from_env(is_production),
            environment,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Refuse configurations that would leave the dashboard unprotected.
    pub fn validate(&self) -> Result<(), StartupError> {
        if self.is_production() {
            if self.auth.jwt_secret.trim().is_empty() {
                return Err(StartupError::Config(
                    "AUTH_JWT_SECRET must be set in production".to_string(),
                ));
            }
            if self.store_backend == StoreBackend::Memory {
                return Err(StartupError::Config(
                    "the memory store backend is not available in production".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, StartupError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| StartupError::Config(format!("invalid HOST/PORT configuration: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_local_development() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:3001");
        assert_eq!(config.auth.redirect_url, "http://localhost:5173");
        assert_eq!(config.promo_unit_price, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn production_requires_jwt_secret() {
        let mut config = AppConfig {
            environment: "production".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(StartupError::Config(_))));

        config.auth.jwt_secret = "s3cret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn store_backend_parses() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("Postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn auth_config_debug_hides_secrets() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "super-secret-value".to_string();
        config.auth.session_access_token = Some("stored-access-token".to_string());
        let rendered = format!("{:?}", config.auth);
        assert!(!rendered.contains("super-secret-value"));
        assert!(!rendered.contains("stored-access-token"));
    }

    #[test]
    fn stored_session_needs_access_token() {
        let mut config = AppConfig::default();
        config.auth.session_refresh_token = Some("refresh".to_string());
        assert!(config.auth.stored_session().is_none());

        config.auth.session_access_token = Some("access".to_string());
        let session = config.auth.stored_session().unwrap();
        assert_eq!(session.access_token, "access");
        assert_eq!(session.refresh_token.as_deref(), Some("refresh"));
    }
}
