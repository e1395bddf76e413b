pub mod memory;
pub mod models;
pub mod postgres;
#[cfg(test)]
pub(crate) mod test_db;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::AppError;
use models::{
    BlogFlagRow, BlogPost, CodeStatRow, CodeType, NewBlogPost, NewPromoCode, PromoCode,
    RedeemedCode, Region, RequestStatRow, UpdateBlogPost,
};

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/promo_admin".to_string()),
            max_connections: std::env::var("DB_POOL_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_POOL_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }
}

pub async fn init_pool(config: &DbConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!("Initializing database connection pool...");
    tracing::debug!(
        "Database URL: {}",
        config.url.replace(
            |c: char| !c.is_ascii_alphanumeric() && c != ':' && c != '/' && c != '@' && c != '.',
            "*"
        )
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(std::time::Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");

    Ok(pool)
}

// Prepared statements hold a single command, so each index is its own query
const CODE_INDEXES: [&str; 4] = [
    "CREATE INDEX IF NOT EXISTS idx_promo_codes_created_at ON promo_codes(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_promo_codes_type_region ON promo_codes(type, region)",
    "CREATE INDEX IF NOT EXISTS idx_promo_code_requests_code ON promo_code_requests(promo_code_id)",
    "CREATE INDEX IF NOT EXISTS idx_promo_code_requests_created_at ON promo_code_requests(created_at DESC)",
];

const BLOG_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS idx_blog_posts_slug ON blog_posts(slug)",
    "CREATE INDEX IF NOT EXISTS idx_blog_posts_pub_created ON blog_posts(published, created_at DESC)",
];

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS admins (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            email TEXT UNIQUE NOT NULL,
            is_admin BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS promo_codes (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            code TEXT UNIQUE NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('starter', 'standard')),
            region TEXT NOT NULL CHECK (region IN ('americas', 'asia-pacific', 'emea')),
            is_used BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    // promo_code_id carries no foreign key: the redemption flow that writes
    // these rows lives outside this service.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS promo_code_requests (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            user_identifier TEXT NOT NULL DEFAULT '',
            promo_code_id UUID NOT NULL,
            business_email TEXT NOT NULL DEFAULT '',
            type TEXT NOT NULL,
            region TEXT NOT NULL,
            verified BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    for ddl in CODE_INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }

    let localized: String = models::localized_columns()
        .iter()
        .map(|c| format!("{} TEXT NOT NULL DEFAULT '',\n", c))
        .collect();

    let blog_ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS blog_posts (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            slug TEXT NOT NULL DEFAULT '',
            author TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '',
            featured_image TEXT NOT NULL DEFAULT '',
            {localized}
            published BOOLEAN NOT NULL DEFAULT false,
            featured BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#
    );

    sqlx::query(&blog_ddl).execute(pool).await?;

    for ddl in BLOG_INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!("Database migrations completed successfully");

    Ok(())
}

// ============================================================================
// Store abstraction
// ============================================================================

/// Filters for listing promo codes; `None` leaves a dimension unconstrained.
#[derive(Debug, Clone, Default)]
pub struct CodeFilter {
    pub code_type: Option<CodeType>,
    pub region: Option<Region>,
    pub is_used: Option<bool>,
    /// Case-insensitive substring of the code
    pub search: Option<String>,
}

impl CodeFilter {
    /// Trimmed search term, if one was given
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn matches(&self, code: &PromoCode) -> bool {
        self.code_type.map_or(true, |t| t == code.code_type)
            && self.region.map_or(true, |r| r == code.region)
            && self.is_used.map_or(true, |u| u == code.is_used)
            && self.search_term().map_or(true, |needle| {
                code.code.to_lowercase().contains(&needle.to_lowercase())
            })
    }
}

/// Result of restoring a redemption back to the available pool
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredCode {
    pub request_id: Uuid,
    pub promo_code_id: Uuid,
    /// `None` when the request pointed at a code that no longer exists
    pub promo_code: Option<PromoCode>,
}

/// Result of deleting redemptions together with their codes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeOutcome {
    pub deleted_requests: u64,
    pub deleted_codes: u64,
    /// Codes whose cleanup failed; retry with a plain code delete
    pub orphaned_code_ids: Vec<Uuid>,
}

/// Row-level access to the dashboard tables.
///
/// Multi-step operations (`restore_request`, `delete_requests_cascade`) are
/// single calls so that each backend can make them atomic.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<std::time::Duration, AppError>;

    async fn is_admin(&self, email: &str) -> Result<bool, AppError>;

    async fn find_existing_codes(&self, codes: &[String]) -> Result<HashSet<String>, AppError>;
    async fn insert_codes(&self, codes: &[NewPromoCode]) -> Result<Vec<PromoCode>, AppError>;
    async fn list_codes(&self, filter: &CodeFilter) -> Result<Vec<PromoCode>, AppError>;
    async fn delete_codes(&self, ids: &[Uuid]) -> Result<u64, AppError>;
    async fn code_stat_rows(&self) -> Result<Vec<CodeStatRow>, AppError>;

    async fn request_stat_rows(&self) -> Result<Vec<RequestStatRow>, AppError>;
    async fn list_redeemed(&self) -> Result<Vec<RedeemedCode>, AppError>;
    async fn set_request_verified(&self, id: Uuid, verified: bool) -> Result<bool, AppError>;
    async fn restore_request(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<RestoredCode>, AppError>;
    async fn delete_requests_cascade(&self, ids: &[Uuid]) -> Result<CascadeOutcome, AppError>;

    async fn list_posts(&self, published_only: bool) -> Result<Vec<BlogPost>, AppError>;
    async fn get_post(&self, id: Uuid) -> Result<Option<BlogPost>, AppError>;
    async fn insert_post(&self, post: &NewBlogPost) -> Result<BlogPost, AppError>;
    async fn update_post(
        &self,
        id: Uuid,
        patch: &UpdateBlogPost,
    ) -> Result<Option<BlogPost>, AppError>;
    async fn delete_posts(&self, ids: &[Uuid]) -> Result<u64, AppError>;
    async fn blog_flag_rows(&self) -> Result<Vec<BlogFlagRow>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_default_uses_env_or_fallback() {
        let config = DbConfig::default();
        assert!(config.max_connections >= 1);
        assert!(config.connect_timeout_secs >= 1);
        assert!(config.idle_timeout_secs >= 1);
        assert!(!config.url.is_empty());
    }

    #[test]
    fn test_code_filter_and_semantics() {
        let code = PromoCode {
            id: Uuid::new_v4(),
            code: "A1".to_string(),
            code_type: CodeType::Starter,
            region: Region::Emea,
            is_used: false,
            created_at: Utc::now(),
        };

        assert!(CodeFilter::default().matches(&code));
        assert!(CodeFilter {
            code_type: Some(CodeType::Starter),
            region: Some(Region::Emea),
            ..Default::default()
        }
        .matches(&code));
        assert!(!CodeFilter {
            code_type: Some(CodeType::Starter),
            region: Some(Region::Americas),
            ..Default::default()
        }
        .matches(&code));
        assert!(!CodeFilter {
            is_used: Some(true),
            ..Default::default()
        }
        .matches(&code));
    }

    #[test]
    fn code_search_ignores_case_and_blank_terms() {
        let code = PromoCode {
            id: Uuid::new_v4(),
            code: "SPRING-2024".to_string(),
            code_type: CodeType::Standard,
            region: Region::Americas,
            is_used: false,
            created_at: Utc::now(),
        };
        let search = |term: &str| CodeFilter {
            search: Some(term.to_string()),
            ..Default::default()
        };

        assert!(search("spring").matches(&code));
        assert!(search(" 2024 ").matches(&code));
        assert!(search("   ").matches(&code));
        assert!(!search("autumn").matches(&code));
    }
}
