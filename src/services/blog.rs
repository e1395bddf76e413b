//! Multilingual blog posts.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AdminIdentity;
use crate::db::models::{BlogPost, Language, NewBlogPost, UpdateBlogPost};
use crate::db::Store;
use crate::error::AppError;
use crate::events::{DashboardEvent, EventBus};

lazy_static::lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
    static ref SLUG_STRIP: Regex = Regex::new(r"[^a-z0-9\s-]").unwrap();
    static ref SLUG_SPACES: Regex = Regex::new(r"\s+").unwrap();
    static ref SLUG_DASHES: Regex = Regex::new(r"-+").unwrap();
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// URL slug derived from a title
pub fn generate_slug(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let stripped = SLUG_STRIP.replace_all(&lowered, "");
    let dashed = SLUG_SPACES.replace_all(&stripped, "-");
    SLUG_DASHES
        .replace_all(&dashed, "-")
        .trim_matches('-')
        .to_string()
}

/// Sanitize editor HTML; keeps the `class` attributes the editor emits for
/// alignment and indentation.
fn sanitize_html(html: &str) -> String {
    ammonia::Builder::default()
        .add_generic_attributes(&["class"])
        .clean(html)
        .to_string()
}

fn check_slug(slug: &str) -> Result<(), AppError> {
    if slug.is_empty() {
        return Err(AppError::Validation("Slug is required".to_string()));
    }
    if !is_valid_slug(slug) {
        return Err(AppError::Validation(
            "Slug must contain only lowercase letters, numbers, and hyphens".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    All,
    Published,
    Draft,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlogFilter {
    pub published_only: bool,
    pub status: PostStatus,
    /// Case-insensitive match on the English title or the author
    pub search: Option<String>,
}

impl BlogFilter {
    fn matches(&self, post: &BlogPost) -> bool {
        let status_ok = match self.status {
            PostStatus::All => true,
            PostStatus::Published => post.published,
            PostStatus::Draft => !post.published,
        };

        let search_ok = match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                post.translations
                    .get(Language::En)
                    .title
                    .to_lowercase()
                    .contains(&needle)
                    || post.author.to_lowercase().contains(&needle)
            }
            _ => true,
        };

        status_ok && search_ok
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlogStats {
    pub total: u64,
    pub published: u64,
    pub draft: u64,
    pub featured: u64,
}

pub struct BlogService {
    store: Arc<dyn Store>,
    events: EventBus,
}

impl BlogService {
    pub fn new(store: Arc<dyn Store>, events: EventBus) -> Self {
        Self { store, events }
    }

    pub async fn list_posts(
        &self,
        _actor: &AdminIdentity,
        filter: &BlogFilter,
    ) -> Result<Vec<BlogPost>, AppError> {
        let posts = self.store.list_posts(filter.published_only).await?;
        Ok(posts.into_iter().filter(|p| filter.matches(p)).collect())
    }

    /// `None` when no post has this id.
    pub async fn get_post(
        &self,
        _actor: &AdminIdentity,
        id: Uuid,
    ) -> Result<Option<BlogPost>, AppError> {
        self.store.get_post(id).await
    }

    pub async fn create_post(
        &self,
        actor: &AdminIdentity,
        mut input: NewBlogPost,
    ) -> Result<BlogPost, AppError> {
        let title = input.translations.get(Language::En).title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }

        input.slug = input.slug.trim().to_string();
        if input.slug.is_empty() {
            input.slug = generate_slug(&title);
        }
        check_slug(&input.slug)?;

        for lang in Language::ALL {
            let t = input.translations.get_mut(lang);
            t.content = sanitize_html(&t.content);
        }

        let post = self.store.insert_post(&input).await?;
        tracing::info!(actor = %actor.email, post_id = %post.id, slug = %post.slug, "blog post created");
        self.events.publish(DashboardEvent::PostsChanged);
        Ok(post)
    }

    /// Partial update; `None` when no post has this id.
    pub async fn update_post(
        &self,
        actor: &AdminIdentity,
        id: Uuid,
        mut patch: UpdateBlogPost,
    ) -> Result<Option<BlogPost>, AppError> {
        if let Some(slug) = patch.slug.as_mut() {
            *slug = slug.trim().to_string();
            check_slug(slug)?;
        }
        for t in patch.translations.values_mut() {
            if let Some(content) = t.content.as_mut() {
                *content = sanitize_html(content);
            }
        }

        let updated = self.store.update_post(id, &patch).await?;
        if let Some(post) = &updated {
            tracing::info!(actor = %actor.email, post_id = %post.id, "blog post updated");
            self.events.publish(DashboardEvent::PostsChanged);
        }
        Ok(updated)
    }

    pub async fn delete_posts(&self, actor: &AdminIdentity, ids: &[Uuid]) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let deleted = self.store.delete_posts(ids).await?;
        tracing::info!(actor = %actor.email, requested = ids.len(), deleted, "blog posts deleted");
        self.events.publish(DashboardEvent::PostsChanged);
        Ok(deleted)
    }

    pub async fn get_blog_stats(&self, _actor: &AdminIdentity) -> Result<BlogStats, AppError> {
        let rows = self.store.blog_flag_rows().await?;

        Ok(rows.iter().fold(BlogStats::default(), |mut acc, row| {
            acc.total += 1;
            if row.published {
                acc.published += 1;
            } else {
                acc.draft += 1;
            }
            if row.featured {
                acc.featured += 1;
            }
            acc
        }))
    }
}
