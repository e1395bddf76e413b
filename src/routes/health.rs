/**
 * Health Routes
 * Endpoints for checking backend health status
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StoreBackend;
use crate::state::AppState;

/// Health status enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Healthy,
    Unhealthy,
    Ready,
    #[serde(rename = "not ready")]
    NotReady,
}

/// Single service check result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCheck {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Detailed health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedHealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    pub environment: String,
    pub store_backend: String,
    pub checks: HealthChecks,
}

/// Health checks for all dependencies
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    pub database: ServiceCheck,
    /// Whether an admin has established a session with this instance
    pub admin_signed_in: bool,
}

/// Ready check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Simple health response
#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleHealthResponse {
    pub status: HealthStatus,
}

async fn check_database(state: &AppState) -> ServiceCheck {
    match state.store.ping().await {
        Ok(duration) => ServiceCheck {
            status: HealthStatus::Healthy,
            response_time: Some(duration.as_millis() as u64),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "database health check failed");
            ServiceCheck {
                status: HealthStatus::Unhealthy,
                response_time: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// GET /health - Simple health ping
pub async fn health_ping() -> impl IntoResponse {
    Json(SimpleHealthResponse {
        status: HealthStatus::Ok,
    })
}

/// GET /health/detailed - Detailed health with all checks
pub async fn health_detailed(State(state): State<AppState>) -> impl IntoResponse {
    let database = check_database(&state).await;

    let response = DetailedHealthResponse {
        status: HealthStatus::Ok,
        timestamp: Utc::now(),
        uptime: state.started_at.elapsed().as_secs(),
        environment: state.config.environment.clone(),
        store_backend: match state.config.store_backend {
            StoreBackend::Postgres => "postgres".to_string(),
            StoreBackend::Memory => "memory".to_string(),
        },
        checks: HealthChecks {
            database,
            admin_signed_in: state.auth.is_authenticated().await,
        },
    };

    (StatusCode::OK, Json(response))
}

/// GET /health/database - Database health check
pub async fn health_database(State(state): State<AppState>) -> impl IntoResponse {
    let check = check_database(&state).await;
    let status = match check.status {
        HealthStatus::Healthy => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(check))
}

/// GET /health/ready - Readiness check; not ready while the store is unreachable
pub async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    let database = check_database(&state).await;
    let is_ready = database.status == HealthStatus::Healthy;

    let response = ReadyResponse {
        status: if is_ready {
            HealthStatus::Ready
        } else {
            HealthStatus::NotReady
        },
        timestamp: Utc::now(),
        uptime: state.started_at.elapsed().as_secs(),
        reason: database.error,
    };

    let status = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{send, test_state};
    use axum::http::Method;

    #[test]
    fn test_health_status_serialization() {
        assert_eq!(serde_json::to_string(&HealthStatus::Ok).unwrap(), "\"ok\"");
        assert_eq!(
            serde_json::to_string(&HealthStatus::NotReady).unwrap(),
            "\"not ready\""
        );
    }

    #[tokio::test]
    async fn test_health_ping_returns_ok() {
        let (state, _) = test_state();
        let (status, body) = send(crate::create_app(state), Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_health_database_reports_store() {
        let (state, _) = test_state();
        let (status, body) =
            send(crate::create_app(state), Method::GET, "/health/database", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body["responseTime"].is_u64());
    }

    #[tokio::test]
    async fn test_health_detailed_returns_ok() {
        let (state, _) = test_state();
        let (status, body) =
            send(crate::create_app(state), Method::GET, "/health/detailed", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["checks"]["adminSignedIn"], false);
        assert!(body["uptime"].is_u64());
    }

    #[tokio::test]
    async fn test_health_ready_returns_ready() {
        let (state, _) = test_state();
        let (status, body) =
            send(crate::create_app(state), Method::GET, "/health/ready", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }
}
