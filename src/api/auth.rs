//! Authentication API endpoints
//!
//! - POST /api/auth/register - Create the first administrator
//! - POST /api/auth/login - Credentials to session token
//! - POST /api/auth/forgot-password - Mail a reset link
//! - POST /api/auth/reset-password - Set a new password from a reset token
//! - POST /api/auth/logout - End the current session
//! - GET /api/auth/me - Current user
//!
//! The session token is returned in the body and set as the `auth_token`
//! cookie, so the same login works for API clients and the HTML back-office.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json, Router,
};

use crate::api::extract::ApiJson;
use crate::api::middleware::{
    enforce_rate_limit, extract_session_token, ApiError, AppState, AuthenticatedUser, ClientIp,
    AUTH_COOKIE,
};
use crate::api::responses::{Ack, LoginResponse};
use crate::models::{
    ForgotPasswordInput, LoginInput, RegisterInput, ResetPasswordInput, Session, User,
};
use crate::services::{Bucket, UserServiceError};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

/// `Set-Cookie` value for a new session
pub fn session_cookie(session: &Session, secure: bool) -> String {
    let max_age = (session.expires_at - chrono::Utc::now()).num_seconds().max(0);
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        AUTH_COOKIE, session.id, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", AUTH_COOKIE);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn cookie_header(value: String) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&value).map_err(|e| {
        tracing::error!("Invalid cookie header: {}", e);
        ApiError::internal_error("Failed to set session cookie")
    })
}

/// Login with per-IP throttling and per-username lockout. Shared by the JSON
/// endpoint and the login page.
pub async fn attempt_login(
    state: &AppState,
    ip: ClientIp,
    input: &LoginInput,
) -> Result<(Session, User), ApiError> {
    enforce_rate_limit(state, Bucket::Login, ip).await?;

    let username = input.username.trim().to_lowercase();
    if state.rate_limiter.is_username_limited(&username).await {
        tracing::warn!("Login locked for '{}'", username);
        return Err(ApiError::rate_limited(
            "Too many failed attempts, please try again in 15 minutes",
            900,
        ));
    }

    match state.user_service.login(input).await {
        Ok(result) => {
            state.rate_limiter.clear_username_attempts(&username).await;
            Ok(result)
        }
        Err(e) => {
            if matches!(e, UserServiceError::AuthenticationError(_)) {
                state.rate_limiter.record_failed_attempt(&username).await;
                tracing::info!("Failed login for '{}'", username);
            }
            Err(e.into())
        }
    }
}

/// POST /api/auth/register
///
/// Only open while no user exists. Logs the new administrator in.
async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.user_service.register(&body).await?;

    let (session, user) = state
        .user_service
        .login(&LoginInput {
            username: user.username,
            password: body.password,
        })
        .await?;
    let cookie = cookie_header(session_cookie(&session, state.config.auth.secure_cookie))?;

    Ok((
        StatusCode::CREATED,
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(LoginResponse {
            token: session.id,
            expires_at: session.expires_at,
            user,
        }),
    ))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    ip: ClientIp,
    ApiJson(body): ApiJson<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (session, user) = attempt_login(&state, ip, &body).await?;
    let cookie = cookie_header(session_cookie(&session, state.config.auth.secure_cookie))?;

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(LoginResponse {
            token: session.id,
            expires_at: session.expires_at,
            user,
        }),
    ))
}

/// POST /api/auth/forgot-password
///
/// Always answers the same so registered addresses cannot be probed.
async fn forgot_password(
    State(state): State<AppState>,
    ip: ClientIp,
    ApiJson(body): ApiJson<ForgotPasswordInput>,
) -> Result<Json<Ack>, ApiError> {
    enforce_rate_limit(&state, Bucket::Form, ip).await?;
    state.user_service.forgot_password(&body.email).await?;
    Ok(Json(Ack::ok(
        "If that address belongs to an account, a reset link is on its way.",
    )))
}

/// POST /api/auth/reset-password
async fn reset_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordInput>,
) -> Result<Json<Ack>, ApiError> {
    state
        .user_service
        .reset_password(&body.token, &body.password)
        .await?;
    Ok(Json(Ack::ok("Your password has been changed. Please log in.")))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;
    state.user_service.logout(&token).await?;

    let cookie = cookie_header(clear_session_cookie(state.config.auth.secure_cookie))?;
    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(header::SET_COOKIE, cookie)]),
    ))
}

/// GET /api/auth/me
async fn me(user: AuthenticatedUser) -> Json<User> {
    Json(user.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn session(days: i64) -> Session {
        let now = Utc::now();
        Session {
            id: "abc".to_string(),
            user_id: 1,
            expires_at: now + Duration::days(days),
            created_at: now,
        }
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(&session(7), false);
        assert!(cookie.starts_with("auth_token=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age="));
        assert!(!cookie.contains("Secure"));
        assert!(session_cookie(&session(7), true).ends_with("; Secure"));
    }

    #[test]
    fn test_session_cookie_never_negative() {
        let cookie = session_cookie(&session(-1), false);
        assert!(cookie.ends_with("Max-Age=0"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie(false);
        assert!(cookie.starts_with("auth_token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
