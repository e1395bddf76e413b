//! PostgreSQL implementation of [`Store`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashSet;
use uuid::Uuid;

use super::models::{
    localized_columns, BlogFlagRow, BlogPost, CodeStatRow, Language, NewBlogPost, NewPromoCode,
    PromoCode, RedeemedCode, RequestStatRow, UpdateBlogPost,
};
use super::{CascadeOutcome, CodeFilter, RestoredCode, Store};
use crate::error::AppError;

const CODE_COLUMNS: &str = "id, code, type, region, is_used, created_at";

/// Rows per INSERT; four binds each keeps a statement far below the
/// 65535-parameter protocol limit
const INSERT_CHUNK_ROWS: usize = 1000;

lazy_static::lazy_static! {
    static ref BLOG_COLUMNS: String = format!(
        "id, slug, author, category, tags, featured_image, published, featured, created_at, updated_at, {}",
        localized_columns().join(", ")
    );
}

/// `%term%` with LIKE wildcards in `term` matched literally
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<std::time::Duration, AppError> {
        let start = std::time::Instant::now();
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database("Database health check failed", e))?;
        Ok(start.elapsed())
    }

    async fn is_admin(&self, email: &str) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM admins WHERE email = $1 AND is_admin = true)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database("Failed to check admin status", e))
    }

    async fn find_existing_codes(&self, codes: &[String]) -> Result<HashSet<String>, AppError> {
        if codes.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = sqlx::query_scalar::<_, String>("SELECT code FROM promo_codes WHERE code = ANY($1)")
            .bind(codes)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database("Failed to check existing codes", e))?;

        Ok(rows.into_iter().collect())
    }

    async fn insert_codes(&self, codes: &[NewPromoCode]) -> Result<Vec<PromoCode>, AppError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database("Failed to insert promo codes", e))?;

        let mut inserted = Vec::with_capacity(codes.len());
        for chunk in codes.chunks(INSERT_CHUNK_ROWS) {
            let mut qb: QueryBuilder<'_, Postgres> =
                QueryBuilder::new("INSERT INTO promo_codes (code, type, region, is_used) ");
            qb.push_values(chunk, |mut row, code| {
                row.push_bind(&code.code)
                    .push_bind(code.code_type.as_str())
                    .push_bind(code.region.as_str())
                    .push_bind(false);
            });
            qb.push(" RETURNING ").push(CODE_COLUMNS);

            let rows = qb
                .build_query_as::<PromoCode>()
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| AppError::database("Failed to insert promo codes", e))?;
            inserted.extend(rows);
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database("Failed to insert promo codes", e))?;

        Ok(inserted)
    }

    async fn list_codes(&self, filter: &CodeFilter) -> Result<Vec<PromoCode>, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT ");
        qb.push(CODE_COLUMNS).push(" FROM promo_codes WHERE TRUE");

        if let Some(code_type) = filter.code_type {
            qb.push(" AND type = ").push_bind(code_type.as_str());
        }
        if let Some(region) = filter.region {
            qb.push(" AND region = ").push_bind(region.as_str());
        }
        if let Some(is_used) = filter.is_used {
            qb.push(" AND is_used = ").push_bind(is_used);
        }
        if let Some(term) = filter.search_term() {
            qb.push(" AND code ILIKE ").push_bind(contains_pattern(term));
        }
        qb.push(" ORDER BY created_at DESC");

        qb.build_query_as::<PromoCode>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database("Failed to fetch promo codes", e))
    }

    async fn delete_codes(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM promo_codes WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database("Failed to delete promo codes", e))?;
        Ok(result.rows_affected())
    }

    async fn code_stat_rows(&self) -> Result<Vec<CodeStatRow>, AppError> {
        sqlx::query_as::<_, CodeStatRow>("SELECT type, region, is_used FROM promo_codes")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database("Failed to fetch statistics", e))
    }

    async fn request_stat_rows(&self) -> Result<Vec<RequestStatRow>, AppError> {
        sqlx::query_as::<_, RequestStatRow>("SELECT verified, created_at FROM promo_code_requests")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database("Failed to fetch redemption statistics", e))
    }

    async fn list_redeemed(&self) -> Result<Vec<RedeemedCode>, AppError> {
        sqlx::query_as::<_, RedeemedCode>(
            r#"
            SELECT r.id, c.code, r.type, r.region, r.created_at AS redeemed_at,
                   r.promo_code_id, r.verified, r.business_email, r.user_identifier
            FROM promo_code_requests r
            INNER JOIN promo_codes c ON c.id = r.promo_code_id
            ORDER BY r.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch redeemed codes", e))
    }

    async fn set_request_verified(&self, id: Uuid, verified: bool) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE promo_code_requests SET verified = $1 WHERE id = $2")
            .bind(verified)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database("Failed to update verified status", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn restore_request(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<RestoredCode>, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database("Failed to restore code", e))?;

        let promo_code_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT promo_code_id FROM promo_code_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::database("Failed to find redemption", e))?;

        // Dropping the transaction rolls it back
        let Some(promo_code_id) = promo_code_id else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM promo_code_requests WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database("Failed to delete redemption", e))?;

        let promo_code = sqlx::query_as::<_, PromoCode>(&format!(
            "UPDATE promo_codes SET is_used = false, created_at = $2 WHERE id = $1 RETURNING {}",
            CODE_COLUMNS
        ))
        .bind(promo_code_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::database("Failed to mark code as available", e))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database("Failed to restore code", e))?;

        Ok(Some(RestoredCode {
            request_id: id,
            promo_code_id,
            promo_code,
        }))
    }

    async fn delete_requests_cascade(&self, ids: &[Uuid]) -> Result<CascadeOutcome, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database("Failed to delete redeemed codes", e))?;

        let mut code_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT promo_code_id FROM promo_code_requests WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::database("Failed to fetch redeemed code references", e))?;
        code_ids.sort_unstable();
        code_ids.dedup();

        let deleted_requests = sqlx::query("DELETE FROM promo_code_requests WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database("Failed to delete redeemed codes", e))?
            .rows_affected();

        let mut outcome = CascadeOutcome {
            deleted_requests,
            ..Default::default()
        };

        if !code_ids.is_empty() {
            // Code cleanup runs in a savepoint so its failure keeps the request deletion
            let mut savepoint = sqlx::Acquire::begin(&mut tx)
                .await
                .map_err(|e| AppError::database("Failed to delete redeemed codes", e))?;

            match sqlx::query("DELETE FROM promo_codes WHERE id = ANY($1)")
                .bind(&code_ids)
                .execute(&mut *savepoint)
                .await
            {
                Ok(result) => {
                    savepoint
                        .commit()
                        .await
                        .map_err(|e| AppError::database("Failed to delete promo codes", e))?;
                    outcome.deleted_codes = result.rows_affected();
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        orphaned = code_ids.len(),
                        "promo code cleanup failed after deleting redemptions"
                    );
                    savepoint
                        .rollback()
                        .await
                        .map_err(|e| AppError::database("Failed to delete redeemed codes", e))?;
                    outcome.orphaned_code_ids = code_ids;
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database("Failed to delete redeemed codes", e))?;

        Ok(outcome)
    }

    async fn list_posts(&self, published_only: bool) -> Result<Vec<BlogPost>, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT ");
        qb.push(BLOG_COLUMNS.as_str()).push(" FROM blog_posts");
        if published_only {
            qb.push(" WHERE published = true");
        }
        qb.push(" ORDER BY created_at DESC");

        qb.build_query_as::<BlogPost>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database("Failed to fetch blog posts", e))
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<BlogPost>, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT ");
        qb.push(BLOG_COLUMNS.as_str())
            .push(" FROM blog_posts WHERE id = ")
            .push_bind(id);

        qb.build_query_as::<BlogPost>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database("Failed to fetch blog post", e))
    }

    async fn insert_post(&self, post: &NewBlogPost) -> Result<BlogPost, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO blog_posts (slug, author, category, tags, featured_image, published, featured",
        );
        for column in localized_columns() {
            qb.push(", ").push(column);
        }
        qb.push(") VALUES (");

        let mut values = qb.separated(", ");
        values
            .push_bind(&post.slug)
            .push_bind(&post.author)
            .push_bind(&post.category)
            .push_bind(&post.tags)
            .push_bind(&post.featured_image)
            .push_bind(post.published)
            .push_bind(post.featured);
        for lang in Language::ALL {
            let t = post.translations.get(lang);
            values
                .push_bind(&t.title)
                .push_bind(&t.content)
                .push_bind(&t.excerpt);
        }
        qb.push(") RETURNING ").push(BLOG_COLUMNS.as_str());

        qb.build_query_as::<BlogPost>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database("Failed to create blog post", e))
    }

    async fn update_post(
        &self,
        id: Uuid,
        patch: &UpdateBlogPost,
    ) -> Result<Option<BlogPost>, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("UPDATE blog_posts SET updated_at = now()");
        // Column names come from the fixed localized set, never from input
        for (column, value) in patch.text_assignments() {
            qb.push(", ").push(column).push(" = ").push_bind(value);
        }
        if let Some(published) = patch.published {
            qb.push(", published = ").push_bind(published);
        }
        if let Some(featured) = patch.featured {
            qb.push(", featured = ").push_bind(featured);
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(BLOG_COLUMNS.as_str());

        qb.build_query_as::<BlogPost>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database("Failed to update blog post", e))
    }

    async fn delete_posts(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database("Failed to delete blog posts", e))?;
        Ok(result.rows_affected())
    }

    async fn blog_flag_rows(&self) -> Result<Vec<BlogFlagRow>, AppError> {
        sqlx::query_as::<_, BlogFlagRow>("SELECT published, featured FROM blog_posts")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database("Failed to fetch blog statistics", e))
    }
}
