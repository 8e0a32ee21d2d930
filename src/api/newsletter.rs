//! Newsletter API endpoints
//!
//! - POST /api/newsletter/subscribe
//! - POST /api/newsletter/unsubscribe
//! - GET /api/newsletter/subscribers (optional `?status=`)
//! - POST /api/newsletter/send - Broadcast to active subscribers

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use serde::Deserialize;

use crate::api::extract::{ApiJson, ApiQuery};
use crate::api::middleware::{enforce_rate_limit, ApiError, AppState, AuthenticatedUser, ClientIp};
use crate::api::responses::{Ack, ListResponse};
use crate::models::{NewsletterInput, SendReport, SubscribeInput, Subscriber, SubscriberStatus};
use crate::services::{Bucket, SubscribeOutcome};

#[derive(Debug, Default, Deserialize)]
pub struct SubscriberQuery {
    pub status: Option<SubscriberStatus>,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/newsletter/subscribe", post(subscribe))
        .route("/newsletter/unsubscribe", post(unsubscribe))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/newsletter/subscribers", get(list_subscribers))
        .route("/newsletter/send", post(send_newsletter))
}

/// POST /api/newsletter/subscribe
async fn subscribe(
    State(state): State<AppState>,
    ip: ClientIp,
    ApiJson(body): ApiJson<SubscribeInput>,
) -> Result<(StatusCode, Json<Ack>), ApiError> {
    enforce_rate_limit(&state, Bucket::Form, ip).await?;

    let outcome = state.newsletter.subscribe(&body.email).await?;
    let status = match outcome {
        SubscribeOutcome::Created(_) => StatusCode::CREATED,
        _ => StatusCode::OK,
    };
    Ok((status, Json(Ack::ok(outcome.message()))))
}

/// POST /api/newsletter/unsubscribe
///
/// Answers the same whether or not the address was subscribed.
async fn unsubscribe(
    State(state): State<AppState>,
    ip: ClientIp,
    ApiJson(body): ApiJson<SubscribeInput>,
) -> Result<Json<Ack>, ApiError> {
    enforce_rate_limit(&state, Bucket::Form, ip).await?;
    state.newsletter.unsubscribe(&body.email).await?;
    Ok(Json(Ack::ok("You have been unsubscribed.")))
}

/// GET /api/newsletter/subscribers
async fn list_subscribers(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SubscriberQuery>,
) -> Result<Json<ListResponse<Subscriber>>, ApiError> {
    let subscribers = state.newsletter.list(query.status).await?;
    Ok(Json(subscribers.into()))
}

/// POST /api/newsletter/send
async fn send_newsletter(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(body): ApiJson<NewsletterInput>,
) -> Result<Json<SendReport>, ApiError> {
    tracing::info!("Newsletter broadcast started by {}", user.0.username);
    let report = state.newsletter.send(&body).await?;
    Ok(Json(report))
}
