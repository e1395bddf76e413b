//! In-memory store for local development and tests.
//!
//! Mirrors the PostgreSQL schema closely enough to exercise every service:
//! unique codes are enforced at insert time and the redemption join drops
//! requests whose code is gone. One write lock per operation makes the
//! multi-step operations atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{
    Admin, BlogFlagRow, BlogPost, CodeStatRow, NewBlogPost, NewPromoCode, PromoCode, PromoCodeRequest,
    RedeemedCode, RequestStatRow, UpdateBlogPost,
};
use super::{CascadeOutcome, CodeFilter, RestoredCode, Store};
use crate::error::AppError;

#[derive(Debug, Default)]
struct Tables {
    admins: Vec<Admin>,
    codes: Vec<PromoCode>,
    requests: Vec<PromoCodeRequest>,
    posts: Vec<BlogPost>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose allow-list grants admin to each given email
    pub fn with_admins<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let admins = emails.into_iter().map(|e| Admin::new(e, true)).collect();
        Self {
            tables: RwLock::new(Tables {
                admins,
                ..Default::default()
            }),
        }
    }

    pub async fn add_admin(&self, email: &str, is_admin: bool) {
        self.tables
            .write()
            .await
            .admins
            .push(Admin::new(email, is_admin));
    }

    /// Record a redemption the way the public redemption flow does:
    /// mark the code used and insert a request row copying its attributes.
    pub async fn record_redemption(
        &self,
        promo_code_id: Uuid,
        user_identifier: &str,
        business_email: &str,
        created_at: DateTime<Utc>,
    ) -> Result<PromoCodeRequest, AppError> {
        let mut tables = self.tables.write().await;
        let code = tables
            .codes
            .iter_mut()
            .find(|c| c.id == promo_code_id)
            .ok_or(AppError::NotFound)?;
        code.is_used = true;

        let request = PromoCodeRequest {
            id: Uuid::new_v4(),
            user_identifier: user_identifier.to_string(),
            promo_code_id,
            business_email: business_email.to_string(),
            code_type: code.code_type,
            region: code.region,
            verified: false,
            created_at,
        };
        tables.requests.push(request.clone());
        Ok(request)
    }

    /// Insert a raw request row, including ones that reference no code
    pub async fn insert_request(&self, request: PromoCodeRequest) {
        self.tables.write().await.requests.push(request);
    }
}

fn newest_first<T>(rows: &mut [T], key: impl Fn(&T) -> DateTime<Utc>) {
    rows.sort_by_key(|r| std::cmp::Reverse(key(r)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<std::time::Duration, AppError> {
        let start = std::time::Instant::now();
        let _tables = self.tables.read().await;
        Ok(start.elapsed())
    }

    async fn is_admin(&self, email: &str) -> Result<bool, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .admins
            .iter()
            .any(|admin| admin.email == email && admin.is_admin))
    }

    async fn find_existing_codes(&self, codes: &[String]) -> Result<HashSet<String>, AppError> {
        let wanted: HashSet<&str> = codes.iter().map(String::as_str).collect();
        let tables = self.tables.read().await;
        Ok(tables
            .codes
            .iter()
            .filter(|c| wanted.contains(c.code.as_str()))
            .map(|c| c.code.clone())
            .collect())
    }

    async fn insert_codes(&self, codes: &[NewPromoCode]) -> Result<Vec<PromoCode>, AppError> {
        let mut tables = self.tables.write().await;

        let mut seen: HashSet<&str> = tables.codes.iter().map(|c| c.code.as_str()).collect();
        for code in codes {
            if !seen.insert(code.code.as_str()) {
                return Err(AppError::Conflict(format!(
                    "duplicate key value violates unique constraint \"promo_codes_code_key\" ({})",
                    code.code
                )));
            }
        }

        let now = Utc::now();
        let inserted: Vec<PromoCode> = codes
            .iter()
            .map(|c| PromoCode {
                id: Uuid::new_v4(),
                code: c.code.clone(),
                code_type: c.code_type,
                region: c.region,
                is_used: false,
                created_at: now,
            })
            .collect();
        tables.codes.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn list_codes(&self, filter: &CodeFilter) -> Result<Vec<PromoCode>, AppError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<PromoCode> = tables
            .codes
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        newest_first(&mut rows, |c| c.created_at);
        Ok(rows)
    }

    async fn delete_codes(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.codes.len();
        tables.codes.retain(|c| !ids.contains(&c.id));
        Ok((before - tables.codes.len()) as u64)
    }

    async fn code_stat_rows(&self) -> Result<Vec<CodeStatRow>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .codes
            .iter()
            .map(|c| CodeStatRow {
                code_type: c.code_type,
                region: c.region,
                is_used: c.is_used,
            })
            .collect())
    }

    async fn request_stat_rows(&self) -> Result<Vec<RequestStatRow>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .requests
            .iter()
            .map(|r| RequestStatRow {
                verified: r.verified,
                created_at: r.created_at,
            })
            .collect())
    }

    async fn list_redeemed(&self) -> Result<Vec<RedeemedCode>, AppError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<RedeemedCode> = tables
            .requests
            .iter()
            .filter_map(|r| {
                let code = tables.codes.iter().find(|c| c.id == r.promo_code_id)?;
                Some(RedeemedCode {
                    id: r.id,
                    code: code.code.clone(),
                    code_type: r.code_type,
                    region: r.region,
                    redeemed_at: r.created_at,
                    promo_code_id: r.promo_code_id,
                    verified: r.verified,
                    business_email: r.business_email.clone(),
                    user_identifier: r.user_identifier.clone(),
                })
            })
            .collect();
        newest_first(&mut rows, |r| r.redeemed_at);
        Ok(rows)
    }

    async fn set_request_verified(&self, id: Uuid, verified: bool) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        match tables.requests.iter_mut().find(|r| r.id == id) {
            Some(request) => {
                request.verified = verified;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn restore_request(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<RestoredCode>, AppError> {
        let mut tables = self.tables.write().await;

        let Some(pos) = tables.requests.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let request = tables.requests.remove(pos);

        let promo_code = tables
            .codes
            .iter_mut()
            .find(|c| c.id == request.promo_code_id)
            .map(|code| {
                code.is_used = false;
                code.created_at = now;
                code.clone()
            });

        Ok(Some(RestoredCode {
            request_id: id,
            promo_code_id: request.promo_code_id,
            promo_code,
        }))
    }

    async fn delete_requests_cascade(&self, ids: &[Uuid]) -> Result<CascadeOutcome, AppError> {
        let mut tables = self.tables.write().await;

        let code_ids: HashSet<Uuid> = tables
            .requests
            .iter()
            .filter(|r| ids.contains(&r.id))
            .map(|r| r.promo_code_id)
            .collect();

        let before_requests = tables.requests.len();
        tables.requests.retain(|r| !ids.contains(&r.id));
        let before_codes = tables.codes.len();
        tables.codes.retain(|c| !code_ids.contains(&c.id));

        Ok(CascadeOutcome {
            deleted_requests: (before_requests - tables.requests.len()) as u64,
            deleted_codes: (before_codes - tables.codes.len()) as u64,
            orphaned_code_ids: Vec::new(),
        })
    }

    async fn list_posts(&self, published_only: bool) -> Result<Vec<BlogPost>, AppError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<BlogPost> = tables
            .posts
            .iter()
            .filter(|p| !published_only || p.published)
            .cloned()
            .collect();
        newest_first(&mut rows, |p| p.created_at);
        Ok(rows)
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<BlogPost>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_post(&self, post: &NewBlogPost) -> Result<BlogPost, AppError> {
        let now = Utc::now();
        let created = BlogPost {
            id: Uuid::new_v4(),
            slug: post.slug.clone(),
            author: post.author.clone(),
            category: post.category.clone(),
            tags: post.tags.clone(),
            featured_image: post.featured_image.clone(),
            published: post.published,
            featured: post.featured,
            created_at: now,
            updated_at: now,
            translations: post.translations.clone(),
        };
        self.tables.write().await.posts.push(created.clone());
        Ok(created)
    }

    async fn update_post(
        &self,
        id: Uuid,
        patch: &UpdateBlogPost,
    ) -> Result<Option<BlogPost>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables.posts.iter_mut().find(|p| p.id == id).map(|post| {
            patch.apply_to(post);
            post.updated_at = Utc::now();
            post.clone()
        }))
    }

    async fn delete_posts(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.posts.len();
        tables.posts.retain(|p| !ids.contains(&p.id));
        Ok((before - tables.posts.len()) as u64)
    }

    async fn blog_flag_rows(&self) -> Result<Vec<BlogFlagRow>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .map(|p| BlogFlagRow {
                published: p.published,
                featured: p.featured,
            })
            .collect())
    }
}
