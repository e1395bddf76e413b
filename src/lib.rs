//! Promo Admin Backend - library for app logic and testing

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod logging;
pub mod retry;
pub mod routes;
pub mod services;
pub mod state;
pub mod sync;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use crate::auth::provider::HostedAuth;
use crate::config::{AppConfig, StoreBackend};
use crate::db::{memory::MemoryStore, postgres::PgStore, DbConfig, Store};
use crate::error::StartupError;
use crate::state::AppState;

/// Request bodies above this size are rejected
const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local dashboard dev server.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:5173"),
                HeaderValue::from_static("http://127.0.0.1:5173"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();

    Router::new()
        .route("/api/auth/sign-in", get(routes::auth::sign_in))
        .route("/api/auth/session", post(routes::auth::establish_session))
        .route("/api/auth/me", get(routes::auth::me))
        .route("/api/auth/sign-out", post(routes::auth::sign_out))
        .route(
            "/api/codes",
            get(routes::codes::list_codes)
                .post(routes::codes::add_codes)
                .delete(routes::codes::delete_codes),
        )
        .route("/api/codes/stats", get(routes::codes::code_stats))
        .route(
            "/api/redemptions",
            get(routes::redemptions::list_redeemed).delete(routes::redemptions::delete_redeemed),
        )
        .route(
            "/api/redemptions/{id}",
            axum::routing::delete(routes::redemptions::delete_one),
        )
        .route(
            "/api/redemptions/{id}/verified",
            patch(routes::redemptions::set_verified),
        )
        .route(
            "/api/redemptions/{id}/restore",
            post(routes::redemptions::restore),
        )
        .route(
            "/api/blog",
            get(routes::blog::list_posts)
                .post(routes::blog::create_post)
                .delete(routes::blog::delete_posts),
        )
        .route("/api/blog/stats", get(routes::blog::blog_stats))
        .route(
            "/api/blog/{id}",
            get(routes::blog::get_post)
                .patch(routes::blog::update_post)
                .delete(routes::blog::delete_post),
        )
        .route("/api/events", get(routes::events::stream_events))
        .route("/health", get(routes::health::health_ping))
        .route("/health/detailed", get(routes::health::health_detailed))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/ready", get(routes::health::health_ready))
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(cors)
}

/// Build the store selected by configuration, running migrations if asked.
pub async fn build_store(config: &AppConfig) -> Result<Arc<dyn Store>, StartupError> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let pool = db::init_pool(&DbConfig::default()).await?;
            if config.run_migrations {
                db::run_migrations(&pool).await?;
            }
            Ok(Arc::new(PgStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!(
                admins = config.memory_admins.len(),
                "Using the in-memory store; data is lost on restart"
            );
            Ok(Arc::new(MemoryStore::with_admins(
                config.memory_admins.iter().cloned(),
            )))
        }
    }
}

/// Run the server (used by main).
pub async fn run() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    // Guards must outlive the server; dropping them stops the log writers
    let _log_guards = logging::init(&config.log);

    if config.auth.jwt_secret.is_empty() {
        tracing::warn!("AUTH_JWT_SECRET is not set; every session token will be rejected");
    }
    if config.auth.url.is_empty() {
        tracing::warn!("AUTH_URL is not set; Google sign-in will not work");
    }

    let store = build_store(&config).await?;
    let provider = Arc::new(HostedAuth::new(&config.auth.url, &config.auth.anon_key));
    let addr = config.bind_addr()?;
    let stored_session = config.auth.stored_session();

    let state = AppState::new(config, store, provider);
    if let Some(user) = state.auth.initialize(stored_session).await {
        tracing::info!(email = %user.email, "restored admin session");
    }
    let app = create_app(state);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(StartupError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{send, test_state};
    use axum::http::StatusCode;

    #[test]
    fn test_create_app_returns_router() {
        let (state, _) = test_state();
        let _app = create_app(state);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let (state, _) = test_state();
        let (status, _) = send(create_app(state), Method::GET, "/api/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn memory_backend_seeds_allow_list() {
        let config = AppConfig {
            store_backend: StoreBackend::Memory,
            memory_admins: vec!["ops@example.com".to_string()],
            ..Default::default()
        };
        let store = build_store(&config).await.unwrap();
        assert!(store.is_admin("ops@example.com").await.unwrap());
        assert!(!store.is_admin("other@example.com").await.unwrap());
    }
}
