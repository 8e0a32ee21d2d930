//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error envelope and conversions from service errors
//! - Authentication (session token from `auth_token` cookie or Bearer header)
//! - Request statistics

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::Cache;
use crate::client::{ApiClient, ClientError};
use crate::config::Config;
use crate::db::repositories::{
    SqlxContactRepository, SqlxPasswordResetRepository, SqlxPostRepository,
    SqlxProjectRepository, SqlxServiceRepository, SqlxSessionRepository,
    SqlxSubscriberRepository, SqlxTestimonialRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    BlogError, BlogService, Bucket, CatalogError, CatalogService, ContactService, ContactServiceError,
    DynMailer, NewsletterError, NewsletterService, RateLimiter, UserService, UserServiceError,
    ValidationErrors,
};
use crate::web::Templates;

/// Name of the session cookie shared by the API and the HTML back-office
pub const AUTH_COOKIE: &str = "auth_token";

// ============================================================================
// Request Statistics
// ============================================================================

/// Lightweight request statistics using atomic operations (no locks)
pub struct RequestStats {
    total_requests: AtomicU64,
    /// Total response time in microseconds (for calculating average)
    total_response_time_us: AtomicU64,
    start_time: Instant,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a request with its response time
    pub fn record(&self, duration_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us.fetch_add(duration_us, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Average response time in microseconds
    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let total_time = self.total_response_time_us.load(Ordering::Relaxed);
        total_time as f64 / total as f64
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Application state
// ============================================================================

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub user_service: Arc<UserService>,
    pub catalog: Arc<CatalogService>,
    pub blog: Arc<BlogService>,
    pub contact_service: Arc<ContactService>,
    pub newsletter: Arc<NewsletterService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub templates: Arc<Templates>,
    pub request_stats: Arc<RequestStats>,
}

impl AppState {
    /// Wire repositories and services over an already migrated pool
    pub fn build(
        pool: DynDatabasePool,
        config: Config,
        cache: Arc<Cache>,
        mailer: DynMailer,
    ) -> anyhow::Result<Self> {
        let upstream = ApiClient::from_config(&config.upstream)?;
        if let Some(client) = &upstream {
            tracing::info!("Lead-capture forms forward to {}", client.base_url());
        }
        let cache_ttl = Duration::from_secs(config.cache.ttl_seconds);

        let user_service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxPasswordResetRepository::boxed(pool.clone()),
            mailer.clone(),
        )
        .with_session_days(config.auth.session_days)
        .with_site(config.site.name.clone(), config.server.public_url.clone());

        let catalog = CatalogService::new(
            SqlxProjectRepository::boxed(pool.clone()),
            SqlxServiceRepository::boxed(pool.clone()),
            SqlxTestimonialRepository::boxed(pool.clone()),
            cache.clone(),
            cache_ttl,
        );
        let blog = BlogService::new(SqlxPostRepository::boxed(pool.clone()), cache, cache_ttl);
        let contact_service =
            ContactService::new(SqlxContactRepository::boxed(pool.clone()), upstream.clone());
        let newsletter = NewsletterService::new(
            SqlxSubscriberRepository::boxed(pool.clone()),
            mailer,
            upstream,
            config.site.name.clone(),
            config.server.public_url.clone(),
        );

        Ok(Self {
            pool,
            config: Arc::new(config),
            user_service: Arc::new(user_service),
            catalog: Arc::new(catalog),
            blog: Arc::new(blog),
            contact_service: Arc::new(contact_service),
            newsletter: Arc::new(newsletter),
            rate_limiter: Arc::new(RateLimiter::new()),
            templates: Arc::new(Templates::new()?),
            request_stats: Arc::new(RequestStats::new()),
        })
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Best-effort client address: proxy headers first, then the socket peer
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        Ok(ClientIp(client_ip(&parts.headers).or(peer)))
    }
}

/// First address of `X-Forwarded-For`, else `X-Real-IP`
pub fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().and_then(|s| s.trim().parse().ok()) {
            return Some(ip);
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: u64) -> Self {
        Self::with_details(
            "RATE_LIMIT",
            message,
            serde_json::json!({ "retry_after": retry_after }),
        )
    }

    pub fn upstream_error(message: impl Into<String>) -> Self {
        Self::new("UPSTREAM_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            "UPSTREAM_ERROR" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let details = serde_json::to_value(&errors).unwrap_or_default();
        Self::with_details("VALIDATION_ERROR", "Please correct the highlighted fields", details)
    }
}

impl From<ClientError> for ApiError {
    fn from(e: ClientError) -> Self {
        tracing::error!("Upstream request failed: {}", e);
        Self::upstream_error("The backend is unavailable. Please try again later.")
    }
}

fn internal(e: anyhow::Error) -> ApiError {
    tracing::error!("Internal error: {:#}", e);
    ApiError::internal_error("Something went wrong. Please try again.")
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Validation(errors) => errors.into(),
            CatalogError::NotFound(what) => Self::not_found(format!("{} not found", what)),
            CatalogError::Internal(e) => internal(e),
        }
    }
}

impl From<BlogError> for ApiError {
    fn from(e: BlogError) -> Self {
        match e {
            BlogError::Validation(errors) => errors.into(),
            BlogError::NotFound => Self::not_found("Post not found"),
            BlogError::Internal(e) => internal(e),
        }
    }
}

impl From<ContactServiceError> for ApiError {
    fn from(e: ContactServiceError) -> Self {
        match e {
            ContactServiceError::Validation(errors) => errors.into(),
            ContactServiceError::NotFound => Self::not_found("Submission not found"),
            ContactServiceError::Upstream(e) => e.into(),
            ContactServiceError::Internal(e) => internal(e),
        }
    }
}

impl From<NewsletterError> for ApiError {
    fn from(e: NewsletterError) -> Self {
        match e {
            NewsletterError::Validation(errors) => errors.into(),
            NewsletterError::Upstream(e) => e.into(),
            NewsletterError::Internal(e) => internal(e),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::Validation(errors) => errors.into(),
            UserServiceError::AuthenticationError(_) => {
                Self::unauthorized("Invalid username or password")
            }
            UserServiceError::RegistrationClosed => {
                Self::forbidden("An administrator already exists, registration is closed")
            }
            UserServiceError::UserExists(msg) => Self::conflict(msg),
            UserServiceError::InvalidResetToken => {
                Self::validation_error("Reset link is invalid or has expired")
            }
            UserServiceError::InternalError(e) => internal(e),
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Value of one cookie from the `Cookie` header
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Session token from `Authorization: Bearer` or the `auth_token` cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_str) = headers.get(header::AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    cookie_value(headers, AUTH_COOKIE)
}

/// Authentication middleware for JSON endpoints
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Authentication middleware for back-office pages: redirects to the login
/// page instead of returning 401
pub async fn require_admin_page(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let login_redirect = {
        let next_path = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/admin".to_string());
        Redirect::to(&format!("/login?next={}", urlencoding::encode(&next_path)))
    };

    let Some(token) = extract_session_token(request.headers()) else {
        return login_redirect.into_response();
    };

    match state.user_service.validate_session(&token).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(AuthenticatedUser(user));
            next.run(request).await
        }
        Ok(None) => login_redirect.into_response(),
        Err(e) => {
            tracing::error!("Session validation failed: {}", e);
            login_redirect.into_response()
        }
    }
}

/// Count a request against a per-IP bucket. Requests with no known address
/// are not limited.
pub async fn enforce_rate_limit(
    state: &AppState,
    bucket: Bucket,
    ip: ClientIp,
) -> Result<(), ApiError> {
    if let Some(ip) = ip.0 {
        if state.rate_limiter.check_ip(bucket, ip).await {
            tracing::warn!("Rate limit hit for {} on {:?}", ip, bucket);
            return Err(ApiError::rate_limited(
                "Too many requests, please try again in a minute",
                60,
            ));
        }
    }
    Ok(())
}

/// Request statistics middleware
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    state.request_stats.record(start.elapsed().as_micros() as u64);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let h = headers(&[(header::AUTHORIZATION, "Bearer test-token-123")]);
        assert_eq!(extract_session_token(&h), Some("test-token-123".to_string()));
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let h = headers(&[(header::COOKIE, "theme=dark; auth_token=test-token-456")]);
        assert_eq!(extract_session_token(&h), Some("test-token-456".to_string()));
    }

    #[test]
    fn test_extract_session_token_bearer_priority() {
        let h = headers(&[
            (header::AUTHORIZATION, "Bearer bearer-token"),
            (header::COOKIE, "auth_token=cookie-token"),
        ]);
        assert_eq!(extract_session_token(&h), Some("bearer-token".to_string()));
    }

    #[test]
    fn test_extract_session_token_ignores_other_cookies() {
        let h = headers(&[(header::COOKIE, "session=old; my_auth_token=x; auth_token=")]);
        assert!(extract_session_token(&h).is_none());
        let h = headers(&[(header::AUTHORIZATION, "Basic invalid")]);
        assert!(extract_session_token(&h).is_none());
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut h = HeaderMap::new();
        h.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        h.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&h), Some("203.0.113.7".parse().unwrap()));

        let mut h = HeaderMap::new();
        h.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&h), Some("10.0.0.2".parse().unwrap()));
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn test_error_codes_map_to_status() {
        let cases = [
            (ApiError::validation_error("x"), StatusCode::BAD_REQUEST),
            (ApiError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::conflict("x"), StatusCode::CONFLICT),
            (ApiError::rate_limited("x", 60), StatusCode::TOO_MANY_REQUESTS),
            (ApiError::upstream_error("x"), StatusCode::BAD_GATEWAY),
            (ApiError::internal_error("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status, "{}", error.error.code);
        }
    }

    #[test]
    fn test_validation_details_name_fields() {
        let error: ApiError = ValidationErrors::single("message", "Message is too short").into();
        assert_eq!(error.error.code, "VALIDATION_ERROR");
        assert_eq!(
            error.error.details,
            Some(serde_json::json!({"message": "Message is too short"}))
        );
    }

    #[test]
    fn test_not_found_names_the_entity() {
        let error: ApiError = CatalogError::NotFound("Project").into();
        assert_eq!(error.error.code, "NOT_FOUND");
        assert_eq!(error.error.message, "Project not found");
    }

    #[test]
    fn test_request_stats_average() {
        let stats = RequestStats::new();
        assert_eq!(stats.avg_response_time_us(), 0.0);
        stats.record(100);
        stats.record(300);
        assert_eq!(stats.total_requests(), 2);
        assert_eq!(stats.avg_response_time_us(), 200.0);
    }
}
