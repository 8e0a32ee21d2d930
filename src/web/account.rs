//! Login, first-run setup, logout and password reset pages

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;

use super::{base_context, render, safe_redirect_target};
use crate::api::auth::{attempt_login, clear_session_cookie, session_cookie};
use crate::api::middleware::{enforce_rate_limit, extract_session_token, AppState, ClientIp};
use crate::models::{LoginInput, RegisterInput, Session};
use crate::services::{Bucket, UserServiceError};

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
    pub reset: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

async fn login_page(
    state: &AppState,
    headers: &HeaderMap,
    status: StatusCode,
    next: &str,
    error: Option<&str>,
    notice: Option<&str>,
) -> Response {
    let registration_open = state
        .user_service
        .registration_open()
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to check registration: {}", e);
            false
        });

    let mut context = base_context(state, headers, "/login");
    context.insert("next", next);
    context.insert("error", &error);
    context.insert("notice", &notice);
    context.insert("registration_open", &registration_open);
    render(state, status, "login.html", &context)
}

fn with_session_cookie(state: &AppState, session: &Session, target: &str) -> Response {
    let cookie = session_cookie(session, state.config.auth.secure_cookie);
    match HeaderValue::from_str(&cookie) {
        Ok(value) => (
            AppendHeaders([(header::SET_COOKIE, value)]),
            Redirect::to(target),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Invalid session cookie: {}", e);
            Redirect::to("/login").into_response()
        }
    }
}

/// GET /login
pub async fn login_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LoginQuery>,
) -> Response {
    let next = safe_redirect_target(query.next.as_deref(), "/admin");
    let notice = query
        .reset
        .is_some()
        .then_some("Your password has been changed. Please log in.");
    login_page(&state, &headers, StatusCode::OK, &next, None, notice).await
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ip: ClientIp,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_redirect_target(form.next.as_deref(), "/admin");
    let input = LoginInput {
        username: form.username,
        password: form.password,
    };

    match attempt_login(&state, ip, &input).await {
        Ok((session, _)) => with_session_cookie(&state, &session, &next),
        Err(e) => {
            let status = e.status();
            login_page(&state, &headers, status, &next, Some(&e.error.message), None).await
        }
    }
}

/// POST /register
///
/// Creates the first administrator and logs them in; closed afterwards.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<RegisterForm>,
) -> Response {
    let input = RegisterInput {
        username: form.username,
        email: form.email,
        password: form.password,
    };

    let result = match state.user_service.register(&input).await {
        Ok(user) => {
            state
                .user_service
                .login(&LoginInput {
                    username: user.username,
                    password: input.password.clone(),
                })
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok((session, _)) => with_session_cookie(&state, &session, "/admin"),
        Err(UserServiceError::Validation(errors)) => {
            let message = errors.to_string();
            login_page(&state, &headers, StatusCode::BAD_REQUEST, "/admin", Some(&message), None).await
        }
        Err(UserServiceError::RegistrationClosed) => {
            login_page(
                &state,
                &headers,
                StatusCode::FORBIDDEN,
                "/admin",
                Some("An administrator already exists. Please log in."),
                None,
            )
            .await
        }
        Err(e) => {
            tracing::error!("Registration failed: {}", e);
            login_page(
                &state,
                &headers,
                StatusCode::INTERNAL_SERVER_ERROR,
                "/admin",
                Some("Registration failed. Please try again."),
                None,
            )
            .await
        }
    }
}

/// POST /logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = extract_session_token(&headers) {
        if let Err(e) = state.user_service.logout(&token).await {
            tracing::warn!("Failed to end session: {}", e);
        }
    }

    let cookie = clear_session_cookie(state.config.auth.secure_cookie);
    match HeaderValue::from_str(&cookie) {
        Ok(value) => (
            AppendHeaders([(header::SET_COOKIE, value)]),
            Redirect::to("/login"),
        )
            .into_response(),
        Err(_) => Redirect::to("/login").into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetQuery {
    pub token: Option<String>,
}

/// Either a reset request (email) or a new password for a mailed token
#[derive(Debug, Default, Deserialize)]
pub struct ResetForm {
    pub email: Option<String>,
    pub token: Option<String>,
    pub password: Option<String>,
}

fn reset_page(
    state: &AppState,
    headers: &HeaderMap,
    status: StatusCode,
    token: Option<&str>,
    error: Option<&str>,
    notice: Option<&str>,
) -> Response {
    let mut context = base_context(state, headers, "/reset-password");
    context.insert("token", &token);
    context.insert("error", &error);
    context.insert("notice", &notice);
    render(state, status, "reset_password.html", &context)
}

/// GET /reset-password
pub async fn reset_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ResetQuery>,
) -> Response {
    let token = query.token.as_deref().filter(|t| !t.trim().is_empty());
    reset_page(&state, &headers, StatusCode::OK, token, None, None)
}

/// POST /reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    ip: ClientIp,
    Form(form): Form<ResetForm>,
) -> Response {
    let token = form.token.as_deref().map(str::trim).filter(|t| !t.is_empty());

    let Some(token) = token else {
        // Request a link
        if let Err(e) = enforce_rate_limit(&state, Bucket::Form, ip).await {
            return reset_page(&state, &headers, e.status(), None, Some(&e.error.message), None);
        }
        let email = form.email.unwrap_or_default();
        if let Err(e) = state.user_service.forgot_password(&email).await {
            tracing::error!("Password reset request failed: {}", e);
        }
        return reset_page(
            &state,
            &headers,
            StatusCode::OK,
            None,
            None,
            Some("If that address belongs to an account, a reset link is on its way."),
        );
    };

    let password = form.password.unwrap_or_default();
    match state.user_service.reset_password(token, &password).await {
        Ok(()) => Redirect::to("/login?reset=1").into_response(),
        Err(UserServiceError::Validation(errors)) => {
            let message = errors.to_string();
            reset_page(&state, &headers, StatusCode::BAD_REQUEST, Some(token), Some(&message), None)
        }
        Err(UserServiceError::InvalidResetToken) => reset_page(
            &state,
            &headers,
            StatusCode::BAD_REQUEST,
            None,
            Some("This reset link is invalid or has expired. Please request a new one."),
            None,
        ),
        Err(e) => {
            tracing::error!("Password reset failed: {}", e);
            reset_page(
                &state,
                &headers,
                StatusCode::INTERNAL_SERVER_ERROR,
                Some(token),
                Some("Failed to reset your password. Please try again."),
                None,
            )
        }
    }
}
