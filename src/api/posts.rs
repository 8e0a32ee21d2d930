//! Blog API endpoints
//!
//! - GET /api/posts - Published posts
//! - GET /api/posts/{slug} - A published post
//! - GET /api/admin/posts - All posts including drafts
//! - POST /api/posts, PUT/DELETE /api/posts/{id} - Manage posts

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::extract::{ApiJson, ApiPath};
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::ListResponse;
use crate::models::{Post, PostInput};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts))
        // Same path as the protected routes so the method routers merge; the
        // segment is a slug for GET and an id for PUT/DELETE
        .route("/posts/{id}", get(get_post))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/admin/posts", get(list_all_posts))
        .route("/posts", post(create_post))
        .route("/posts/{id}", put(update_post).delete(delete_post))
}

/// GET /api/posts
async fn list_posts(State(state): State<AppState>) -> Result<Json<ListResponse<Post>>, ApiError> {
    Ok(Json(state.blog.list_published().await?.into()))
}

/// GET /api/posts/{slug}
async fn get_post(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.blog.get_published(&slug).await?))
}

/// GET /api/admin/posts
async fn list_all_posts(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Post>>, ApiError> {
    Ok(Json(state.blog.list_all().await?.into()))
}

/// POST /api/posts
async fn create_post(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PostInput>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let post = state.blog.create(&body).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// PUT /api/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<PostInput>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.blog.update(id, &body).await?))
}

/// DELETE /api/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.blog.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
