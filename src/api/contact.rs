//! Contact form API endpoints
//!
//! - POST /api/contact - Submit the contact form
//! - GET /api/contact/submissions - List submissions (optional `?status=`)
//! - PUT /api/contact/submissions/{id}/status - Change a submission's status
//! - DELETE /api/contact/submissions/{id} - Delete a submission

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};

use serde::Deserialize;

use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::middleware::{enforce_rate_limit, ApiError, AppState, ClientIp};
use crate::api::responses::{Ack, ListResponse};
use crate::models::{ContactInput, ContactStatus, ContactSubmission, UpdateContactStatusInput};
use crate::services::{Bucket, ContactOutcome};

#[derive(Debug, Default, Deserialize)]
pub struct SubmissionQuery {
    pub status: Option<ContactStatus>,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/contact", post(submit_contact))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/contact/submissions", get(list_submissions))
        .route("/contact/submissions/{id}/status", put(update_status))
        .route("/contact/submissions/{id}", delete(delete_submission))
}

/// POST /api/contact
async fn submit_contact(
    State(state): State<AppState>,
    ip: ClientIp,
    ApiJson(body): ApiJson<ContactInput>,
) -> Result<(StatusCode, Json<Ack>), ApiError> {
    enforce_rate_limit(&state, Bucket::Form, ip).await?;

    let status = match state.contact_service.submit(&body).await? {
        ContactOutcome::Stored(_) => StatusCode::CREATED,
        ContactOutcome::Forwarded => StatusCode::OK,
    };
    Ok((
        status,
        Json(Ack::ok("Thanks for reaching out! We'll get back to you soon.")),
    ))
}

/// GET /api/contact/submissions
async fn list_submissions(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SubmissionQuery>,
) -> Result<Json<ListResponse<ContactSubmission>>, ApiError> {
    let submissions = state.contact_service.list(query.status).await?;
    Ok(Json(submissions.into()))
}

/// PUT /api/contact/submissions/{id}/status
async fn update_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateContactStatusInput>,
) -> Result<Json<ContactSubmission>, ApiError> {
    let submission = state.contact_service.update_status(id, body.status).await?;
    tracing::info!("Contact submission {} marked {}", id, submission.status);
    Ok(Json(submission))
}

/// DELETE /api/contact/submissions/{id}
async fn delete_submission(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.contact_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
