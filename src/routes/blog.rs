/**
 * Blog Routes
 * CRUD API endpoints for multilingual blog posts
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::{DeleteResponse, IdsRequest};
use crate::auth::extract::AdminSession;
use crate::db::models::{NewBlogPost, UpdateBlogPost};
use crate::error::AppError;
use crate::services::blog::BlogFilter;
use crate::state::AppState;

/// GET /api/blog - List posts, newest first
pub async fn list_posts(
    session: AdminSession,
    State(state): State<AppState>,
    Query(filter): Query<BlogFilter>,
) -> Result<impl IntoResponse, AppError> {
    let posts = state.blog.list_posts(&session.identity, &filter).await?;
    Ok(Json(posts))
}

/// GET /api/blog/{id}
pub async fn get_post(
    session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let post = state
        .blog
        .get_post(&session.identity, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(post))
}

/// POST /api/blog - Create a post
pub async fn create_post(
    session: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<NewBlogPost>,
) -> Result<impl IntoResponse, AppError> {
    let post = state.blog.create_post(&session.identity, payload).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// PATCH /api/blog/{id} - Update only the provided fields
pub async fn update_post(
    session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBlogPost>,
) -> Result<impl IntoResponse, AppError> {
    let post = state
        .blog
        .update_post(&session.identity, id, payload)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(post))
}

/// DELETE /api/blog/{id}
pub async fn delete_post(
    session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state.blog.delete_posts(&session.identity, &[id]).await?;
    if deleted == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Json(DeleteResponse {
        success: true,
        deleted,
    }))
}

/// DELETE /api/blog - Bulk delete by id
pub async fn delete_posts(
    session: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<IdsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state
        .blog
        .delete_posts(&session.identity, &payload.ids)
        .await?;
    Ok(Json(DeleteResponse {
        success: true,
        deleted,
    }))
}

/// GET /api/blog/stats
pub async fn blog_stats(
    session: AdminSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let stats = state.blog.get_blog_stats(&session.identity).await?;
    Ok(Json(stats))
}
