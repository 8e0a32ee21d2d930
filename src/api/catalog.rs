//! Catalog API endpoints
//!
//! Public:
//! - GET /api/projects - Portfolio grid (`?category=&featured=&technology=&search=&sort=`)
//! - GET /api/projects/{id}
//! - GET /api/services, GET /api/services/{id}
//! - GET /api/testimonials
//!
//! Protected: POST/PUT/DELETE on the same resources.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};

use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::ListResponse;
use crate::models::{
    Project, ProjectFilter, ProjectInput, Service, ServiceInput, Testimonial, TestimonialInput,
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects))
        .route("/projects/{id}", get(get_project))
        .route("/services", get(list_services))
        .route("/services/{id}", get(get_service))
        .route("/testimonials", get(list_testimonials))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/projects", post(create_project))
        .route("/projects/{id}", put(update_project).delete(delete_project))
        .route("/services", post(create_service))
        .route("/services/{id}", put(update_service).delete(delete_service))
        .route("/testimonials", post(create_testimonial))
        .route("/testimonials/{id}", delete(delete_testimonial))
}

// ============================================================================
// Projects
// ============================================================================

/// GET /api/projects
async fn list_projects(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ProjectFilter>,
) -> Result<Json<ListResponse<Project>>, ApiError> {
    let projects = state.catalog.list_projects(&filter).await?;
    Ok(Json(projects.into()))
}

/// GET /api/projects/{id}
async fn get_project(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.catalog.get_project(id).await?))
}

/// POST /api/projects
async fn create_project(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ProjectInput>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = state.catalog.create_project(&body).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// PUT /api/projects/{id}
async fn update_project(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<ProjectInput>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.catalog.update_project(id, &body).await?))
}

/// DELETE /api/projects/{id}
async fn delete_project(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_project(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Services
// ============================================================================

/// GET /api/services
async fn list_services(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Service>>, ApiError> {
    Ok(Json(state.catalog.list_services().await?.into()))
}

/// GET /api/services/{id}
async fn get_service(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Service>, ApiError> {
    Ok(Json(state.catalog.get_service(id).await?))
}

/// POST /api/services
async fn create_service(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ServiceInput>,
) -> Result<(StatusCode, Json<Service>), ApiError> {
    let service = state.catalog.create_service(&body).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

/// PUT /api/services/{id}
async fn update_service(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<ServiceInput>,
) -> Result<Json<Service>, ApiError> {
    Ok(Json(state.catalog.update_service(id, &body).await?))
}

/// DELETE /api/services/{id}
async fn delete_service(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_service(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Testimonials
// ============================================================================

/// GET /api/testimonials
async fn list_testimonials(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Testimonial>>, ApiError> {
    Ok(Json(state.catalog.list_testimonials().await?.into()))
}

/// POST /api/testimonials
async fn create_testimonial(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TestimonialInput>,
) -> Result<(StatusCode, Json<Testimonial>), ApiError> {
    let testimonial = state.catalog.create_testimonial(&body).await?;
    Ok((StatusCode::CREATED, Json(testimonial)))
}

/// DELETE /api/testimonials/{id}
async fn delete_testimonial(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_testimonial(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
