//! Public pages and lead-capture form posts

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use std::fmt::Display;

use super::{base_context, error_page, render, safe_redirect_target, Theme};
use crate::api::middleware::{enforce_rate_limit, ApiError, AppState, ClientIp};
use crate::models::{ContactInput, ProjectFilter};
use crate::services::{
    portfolio, BlogError, Bucket, CatalogError, ContactServiceError, NewsletterError,
};

const HOME_PROJECTS: usize = 3;
const HOME_POSTS: usize = 3;

/// Log a failed load and turn it into a notice; the page still renders
fn or_notice<T: Default, E: Display>(result: Result<T, E>, what: &str, notices: &mut Vec<String>) -> T {
    result.unwrap_or_else(|e| {
        tracing::error!("Failed to load {}: {}", what, e);
        notices.push(format!("Failed to load {}. Please try again.", what));
        T::default()
    })
}

/// GET /
pub async fn home(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let mut notices = Vec::new();
    let featured_filter = ProjectFilter {
        featured: Some(true),
        ..Default::default()
    };

    let (projects, services, testimonials, posts) = tokio::join!(
        state.catalog.list_projects(&featured_filter),
        state.catalog.list_services(),
        state.catalog.list_testimonials(),
        state.blog.list_published(),
    );
    let mut projects = or_notice(projects, "projects", &mut notices);
    projects.truncate(HOME_PROJECTS);
    let services = or_notice(services, "services", &mut notices);
    let testimonials = or_notice(testimonials, "testimonials", &mut notices);
    let mut posts = or_notice(posts, "posts", &mut notices);
    posts.truncate(HOME_POSTS);

    let mut context = base_context(&state, &headers, "/");
    context.insert("projects", &projects);
    context.insert("services", &services);
    context.insert("testimonials", &testimonials);
    context.insert("posts", &posts);
    context.insert("notices", &notices);
    render(&state, StatusCode::OK, "home.html", &context)
}

/// GET /about
pub async fn about(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let mut notices = Vec::new();
    let testimonials = or_notice(state.catalog.list_testimonials().await, "testimonials", &mut notices);

    let mut context = base_context(&state, &headers, "/about");
    context.insert("testimonials", &testimonials);
    context.insert("notices", &notices);
    render(&state, StatusCode::OK, "about.html", &context)
}

/// GET /services
pub async fn services(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let mut notices = Vec::new();
    let services = or_notice(state.catalog.list_services().await, "services", &mut notices);

    let mut context = base_context(&state, &headers, "/services");
    context.insert("services", &services);
    context.insert("notices", &notices);
    render(&state, StatusCode::OK, "services.html", &context)
}

/// GET /portfolio
pub async fn portfolio(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<ProjectFilter>,
) -> Response {
    let mut notices = Vec::new();
    let all = or_notice(state.catalog.all_projects().await, "projects", &mut notices);

    let mut context = base_context(&state, &headers, "/portfolio");
    context.insert("projects", &portfolio::filter_projects(&all, &filter));
    context.insert("categories", &portfolio::categories(&all));
    context.insert("technologies", &portfolio::technologies(&all));
    context.insert("filter", &filter);
    context.insert("notices", &notices);
    render(&state, StatusCode::OK, "portfolio.html", &context)
}

/// GET /portfolio/{id}
pub async fn project_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    match state.catalog.get_project(id).await {
        Ok(project) => {
            let mut context = base_context(&state, &headers, "/portfolio");
            context.insert("project", &project);
            render(&state, StatusCode::OK, "project.html", &context)
        }
        Err(CatalogError::NotFound(_)) => {
            error_page(&state, &headers, StatusCode::NOT_FOUND, "That project does not exist.")
        }
        Err(e) => {
            tracing::error!("Failed to load project {}: {}", id, e);
            error_page(
                &state,
                &headers,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load project. Please try again.",
            )
        }
    }
}

/// GET /blog
pub async fn blog(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let mut notices = Vec::new();
    let posts = or_notice(state.blog.list_published().await, "posts", &mut notices);

    let mut context = base_context(&state, &headers, "/blog");
    context.insert("posts", &posts);
    context.insert("notices", &notices);
    render(&state, StatusCode::OK, "blog.html", &context)
}

/// GET /blog/{slug}
pub async fn post_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Response {
    match state.blog.get_published(&slug).await {
        Ok(post) => {
            let mut context = base_context(&state, &headers, "/blog");
            context.insert("post", &post);
            render(&state, StatusCode::OK, "post.html", &context)
        }
        Err(BlogError::NotFound) => {
            error_page(&state, &headers, StatusCode::NOT_FOUND, "That post does not exist.")
        }
        Err(e) => {
            tracing::error!("Failed to load post '{}': {}", slug, e);
            error_page(
                &state,
                &headers,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load post. Please try again.",
            )
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactPageQuery {
    pub sent: Option<String>,
}

fn contact_page(
    state: &AppState,
    headers: &HeaderMap,
    status: StatusCode,
    form: &ContactInput,
    errors: &serde_json::Value,
    message: Option<&str>,
    sent: bool,
) -> Response {
    let mut context = base_context(state, headers, "/contact");
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("error", &message);
    context.insert("sent", &sent);
    render(state, status, "contact.html", &context)
}

/// GET /contact
pub async fn contact_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ContactPageQuery>,
) -> Response {
    contact_page(
        &state,
        &headers,
        StatusCode::OK,
        &ContactInput::default(),
        &serde_json::json!({}),
        None,
        query.sent.is_some(),
    )
}

/// POST /contact
///
/// Field errors re-render the form with the submitted values; success
/// redirects so a refresh does not resubmit.
pub async fn submit_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    ip: ClientIp,
    Form(form): Form<ContactInput>,
) -> Response {
    let empty = serde_json::json!({});
    if let Err(e) = enforce_rate_limit(&state, Bucket::Form, ip).await {
        return contact_page(
            &state,
            &headers,
            StatusCode::TOO_MANY_REQUESTS,
            &form,
            &empty,
            Some(&e.error.message),
            false,
        );
    }

    match state.contact_service.submit(&form).await {
        Ok(_) => Redirect::to("/contact?sent=1").into_response(),
        Err(ContactServiceError::Validation(errors)) => {
            let errors = serde_json::to_value(&errors).unwrap_or_default();
            contact_page(
                &state,
                &headers,
                StatusCode::BAD_REQUEST,
                &form,
                &errors,
                Some("Please correct the highlighted fields."),
                false,
            )
        }
        Err(e) => {
            let status = ApiError::from(e).status();
            contact_page(
                &state,
                &headers,
                status,
                &form,
                &empty,
                Some("Failed to send your message. Please try again."),
                false,
            )
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EmailForm {
    #[serde(default)]
    pub email: String,
}

fn message_page(
    state: &AppState,
    headers: &HeaderMap,
    status: StatusCode,
    title: &str,
    message: &str,
) -> Response {
    let mut context = base_context(state, headers, "");
    context.insert("title", title);
    context.insert("message", message);
    context.insert("success", &status.is_success());
    render(state, status, "message.html", &context)
}

fn newsletter_failure(state: &AppState, headers: &HeaderMap, title: &str, e: NewsletterError) -> Response {
    match e {
        NewsletterError::Validation(errors) => {
            let message = errors
                .get("email")
                .unwrap_or("Please enter a valid email address.")
                .to_string();
            message_page(state, headers, StatusCode::BAD_REQUEST, title, &message)
        }
        other => {
            let status = ApiError::from(other).status();
            message_page(
                state,
                headers,
                status,
                title,
                "Failed to update your subscription. Please try again.",
            )
        }
    }
}

/// POST /newsletter
pub async fn subscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    ip: ClientIp,
    Form(form): Form<EmailForm>,
) -> Response {
    const TITLE: &str = "Newsletter";
    if let Err(e) = enforce_rate_limit(&state, Bucket::Form, ip).await {
        return message_page(&state, &headers, StatusCode::TOO_MANY_REQUESTS, TITLE, &e.error.message);
    }
    match state.newsletter.subscribe(&form.email).await {
        Ok(outcome) => message_page(&state, &headers, StatusCode::OK, TITLE, outcome.message()),
        Err(e) => newsletter_failure(&state, &headers, TITLE, e),
    }
}

/// GET /unsubscribe
pub async fn unsubscribe_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EmailForm>,
) -> Response {
    let mut context = base_context(&state, &headers, "/unsubscribe");
    context.insert("email", &query.email);
    render(&state, StatusCode::OK, "unsubscribe.html", &context)
}

/// POST /unsubscribe
pub async fn unsubscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    ip: ClientIp,
    Form(form): Form<EmailForm>,
) -> Response {
    const TITLE: &str = "Unsubscribe";
    if let Err(e) = enforce_rate_limit(&state, Bucket::Form, ip).await {
        return message_page(&state, &headers, StatusCode::TOO_MANY_REQUESTS, TITLE, &e.error.message);
    }
    match state.newsletter.unsubscribe(&form.email).await {
        Ok(_) => message_page(
            &state,
            &headers,
            StatusCode::OK,
            TITLE,
            "You have been unsubscribed. Sorry to see you go!",
        ),
        Err(e) => newsletter_failure(&state, &headers, TITLE, e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ThemeForm {
    pub theme: String,
    pub back: Option<String>,
}

/// POST /theme
///
/// Stores the preference for a year and returns to the page it came from.
pub async fn set_theme(Form(form): Form<ThemeForm>) -> Response {
    let target = safe_redirect_target(form.back.as_deref(), "/");
    let Some(theme) = Theme::parse(&form.theme) else {
        return Redirect::to(&target).into_response();
    };

    let cookie = format!(
        "{}={}; Path=/; Max-Age=31536000; SameSite=Lax",
        Theme::COOKIE,
        theme.as_str()
    );
    match HeaderValue::from_str(&cookie) {
        Ok(value) => (
            AppendHeaders([(header::SET_COOKIE, value)]),
            Redirect::to(&target),
        )
            .into_response(),
        Err(_) => Redirect::to(&target).into_response(),
    }
}
