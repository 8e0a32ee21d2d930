//! Admin API endpoints
//!
//! - GET /api/admin/stats - Dashboard counters

use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{ContactCounts, StatsResponse, SubscriberCounts};
use crate::models::{ContactStatus, SubscriberStatus};

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/stats", get(get_stats))
}

/// Counters for the dashboard, shared with the HTML back-office
pub async fn collect_stats(state: &AppState) -> Result<StatsResponse, ApiError> {
    let (projects, services, posts) = tokio::try_join!(
        async { state.catalog.project_count().await.map_err(ApiError::from) },
        async { state.catalog.service_count().await.map_err(ApiError::from) },
        async { state.blog.count().await.map_err(ApiError::from) },
    )?;
    let (contacts_total, contacts_new, subscribers_total, subscribers_active) = tokio::try_join!(
        async { state.contact_service.count(None).await.map_err(ApiError::from) },
        async {
            state
                .contact_service
                .count(Some(ContactStatus::New))
                .await
                .map_err(ApiError::from)
        },
        async { state.newsletter.count(None).await.map_err(ApiError::from) },
        async {
            state
                .newsletter
                .count(Some(SubscriberStatus::Active))
                .await
                .map_err(ApiError::from)
        },
    )?;

    Ok(StatsResponse {
        projects,
        services,
        posts,
        contacts: ContactCounts {
            total: contacts_total,
            new: contacts_new,
        },
        subscribers: SubscriberCounts {
            total: subscribers_total,
            active: subscribers_active,
        },
        uptime_seconds: state.request_stats.uptime_seconds(),
        total_requests: state.request_stats.total_requests(),
    })
}

/// GET /api/admin/stats
async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    Ok(Json(collect_stats(&state).await?))
}
