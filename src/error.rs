//! Error taxonomy shared by the store, the auth gate and the services.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::routes::ErrorResponse;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication required. Please sign in to perform this action.")]
    Unauthenticated,

    #[error("Session expired. Please sign in again.")]
    SessionExpired,

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("{0} is not authorized to use this dashboard")]
    NotAdmin(String),

    #[error("{0}")]
    Validation(String),

    #[error("Not found")]
    NotFound,

    #[error("{context}: {source}")]
    Database {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database error: {0}")]
    Conflict(String),

    #[error("Database not available")]
    Unavailable,

    #[error("Identity provider error: {0}")]
    Provider(String),
}

impl AppError {
    /// Wrap a sqlx error with context. Unique violations become `Conflict`.
    pub fn database(context: &'static str, source: sqlx::Error) -> Self {
        if let Some(db_err) = source.as_database_error() {
            if db_err.is_unique_violation() {
                return AppError::Conflict(db_err.message().to_string());
            }
        }
        AppError::Database { context, source }
    }

    /// Errors that a session refresh may cure
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            AppError::Unauthenticated | AppError::SessionExpired | AppError::InvalidSession(_)
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated | AppError::SessionExpired | AppError::InvalidSession(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::NotAdmin(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Driver details stay in the logs
        let (error, message) = match &self {
            AppError::Database { context, source } => {
                tracing::error!(error = %source, "{}", context);
                (context.to_string(), None)
            }
            AppError::Provider(detail) => {
                tracing::error!(error = %detail, "identity provider call failed");
                ("Identity provider error".to_string(), None)
            }
            AppError::SessionExpired | AppError::Unauthenticated => {
                (self.to_string(), Some("Please sign in again".to_string()))
            }
            other => (other.to_string(), None),
        };

        (status, Json(ErrorResponse { error, message })).into_response()
    }
}

/// Failures that abort process startup
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to initialize database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_retryable() {
        assert!(AppError::SessionExpired.is_auth());
        assert!(AppError::InvalidSession("bad".into()).is_auth());
        assert!(!AppError::NotAdmin("x@example.com".into()).is_auth());
        assert!(!AppError::NotFound.is_auth());
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::NotAdmin("x@example.com".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Conflict("duplicate key".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn conflict_message_reads_as_database_error() {
        let err = AppError::Conflict("duplicate key value".into());
        assert_eq!(err.to_string(), "Database error: duplicate key value");
    }
}
