//! Back-office pages
//!
//! Every route here sits behind `require_admin_page`, which puts the
//! logged-in user into the request extensions. Actions are plain form
//! posts that redirect back to the listing with a notice.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tera::Context;

use super::{base_context, error_page, render};
use crate::api::admin::collect_stats;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    ContactStatus, NewsletterInput, ProjectInput, ProjectLinks, ServiceInput, SubscriberStatus,
};
use crate::services::{CatalogError, NewsletterError, ValidationErrors};

const RECENT_CONTACTS: usize = 5;

#[derive(Debug, Default, Deserialize)]
pub struct NoticeQuery {
    pub notice: Option<String>,
    pub status: Option<ContactStatus>,
}

fn notice_text(code: Option<&str>) -> Option<&'static str> {
    match code? {
        "updated" => Some("Status updated."),
        "deleted" => Some("Deleted."),
        "created" => Some("Created."),
        _ => None,
    }
}

/// `3d 4h`, `4h 12m` or `12m`
fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = seconds % 86_400 / 3600;
    let minutes = seconds % 3600 / 60;
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

fn admin_context(state: &AppState, headers: &HeaderMap, path: &str, user: &AuthenticatedUser) -> Context {
    let mut context = base_context(state, headers, path);
    context.insert("user", &user.0);
    context
}

/// Listing page after a failed action, or the error page when the listing
/// itself cannot be built
fn action_failed(state: &AppState, headers: &HeaderMap, what: &str, e: ApiError) -> Response {
    let status = e.status();
    if status == StatusCode::NOT_FOUND {
        return error_page(state, headers, status, &format!("That {} no longer exists.", what));
    }
    error_page(state, headers, status, &format!("Failed to update {}. Please try again.", what))
}

/// GET /admin
pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: AuthenticatedUser,
) -> Response {
    let mut context = admin_context(&state, &headers, "/admin", &user);
    let mut notices: Vec<String> = Vec::new();

    match collect_stats(&state).await {
        Ok(stats) => {
            context.insert("uptime", &format_uptime(stats.uptime_seconds));
            context.insert("stats", &stats);
        }
        Err(e) => {
            tracing::error!("Failed to load dashboard stats: {}", e.error.message);
            notices.push("Failed to load statistics. Please try again.".to_string());
        }
    }
    match state.contact_service.list(Some(ContactStatus::New)).await {
        Ok(mut contacts) => {
            contacts.truncate(RECENT_CONTACTS);
            context.insert("recent_contacts", &contacts);
        }
        Err(e) => {
            tracing::error!("Failed to load recent contacts: {}", e);
            notices.push("Failed to load contact submissions. Please try again.".to_string());
        }
    }
    context.insert("notices", &notices);
    render(&state, StatusCode::OK, "admin/dashboard.html", &context)
}

/// GET /admin/contacts
pub async fn contacts(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: AuthenticatedUser,
    Query(query): Query<NoticeQuery>,
) -> Response {
    let mut context = admin_context(&state, &headers, "/admin/contacts", &user);
    let submissions = match state.contact_service.list(query.status).await {
        Ok(submissions) => submissions,
        Err(e) => {
            tracing::error!("Failed to load contact submissions: {}", e);
            context.insert("notices", &["Failed to load contact submissions. Please try again."]);
            Vec::new()
        }
    };
    context.insert("submissions", &submissions);
    context.insert("statuses", &ContactStatus::ALL);
    context.insert("current_status", &query.status);
    context.insert("notice", &notice_text(query.notice.as_deref()));
    render(&state, StatusCode::OK, "admin/contacts.html", &context)
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: ContactStatus,
}

/// POST /admin/contacts/{id}/status
pub async fn update_contact_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Form(form): Form<StatusForm>,
) -> Response {
    match state.contact_service.update_status(id, form.status).await {
        Ok(_) => Redirect::to("/admin/contacts?notice=updated").into_response(),
        Err(e) => action_failed(&state, &headers, "submission", e.into()),
    }
}

/// POST /admin/contacts/{id}/delete
pub async fn delete_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    match state.contact_service.delete(id).await {
        Ok(()) => Redirect::to("/admin/contacts?notice=deleted").into_response(),
        Err(e) => action_failed(&state, &headers, "submission", e.into()),
    }
}

async fn subscribers_page(
    state: &AppState,
    headers: &HeaderMap,
    user: &AuthenticatedUser,
    status: StatusCode,
    extra: impl FnOnce(&mut Context),
) -> Response {
    let mut context = admin_context(state, headers, "/admin/subscribers", user);
    let subscribers = match state.newsletter.list(None).await {
        Ok(subscribers) => subscribers,
        Err(e) => {
            tracing::error!("Failed to load subscribers: {}", e);
            context.insert("notices", &["Failed to load subscribers. Please try again."]);
            Vec::new()
        }
    };
    let active = subscribers
        .iter()
        .filter(|s| s.status == SubscriberStatus::Active)
        .count();
    context.insert("subscribers", &subscribers);
    context.insert("active_count", &active);
    context.insert("form", &NewsletterInput::default());
    context.insert("errors", &serde_json::json!({}));
    extra(&mut context);
    render(state, status, "admin/subscribers.html", &context)
}

/// GET /admin/subscribers
pub async fn subscribers(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: AuthenticatedUser,
) -> Response {
    subscribers_page(&state, &headers, &user, StatusCode::OK, |_| {}).await
}

/// POST /admin/newsletter
pub async fn send_newsletter(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: AuthenticatedUser,
    Form(form): Form<NewsletterInput>,
) -> Response {
    match state.newsletter.send(&form).await {
        Ok(report) => {
            tracing::info!(
                "Newsletter sent by {}: {} delivered, {} failed",
                user.0.username,
                report.sent,
                report.failed
            );
            subscribers_page(&state, &headers, &user, StatusCode::OK, |context| {
                context.insert("report", &report);
            })
            .await
        }
        Err(NewsletterError::Validation(errors)) => {
            subscribers_page(&state, &headers, &user, StatusCode::BAD_REQUEST, |context| {
                context.insert("form", &form);
                context.insert("errors", &errors);
            })
            .await
        }
        Err(e) => action_failed(&state, &headers, "newsletter", e.into()),
    }
}

/// Admin project form; lists are comma separated
#[derive(Debug, Default, Deserialize, serde::Serialize)]
pub struct ProjectForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technologies: String,
    #[serde(default)]
    pub image: String,
    /// Checkbox: present when ticked
    pub featured: Option<String>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub live_url: String,
    #[serde(default)]
    pub repository_url: String,
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl From<&ProjectForm> for ProjectInput {
    fn from(form: &ProjectForm) -> Self {
        ProjectInput {
            title: form.title.clone(),
            category: form.category.clone(),
            description: form.description.clone(),
            technologies: split_list(&form.technologies),
            image: form.image.clone(),
            featured: form.featured.is_some(),
            date: form.date.clone(),
            gallery: Vec::new(),
            tags: split_list(&form.tags),
            links: ProjectLinks {
                live: non_empty(&form.live_url),
                repository: non_empty(&form.repository_url),
            },
        }
    }
}

async fn projects_page(
    state: &AppState,
    headers: &HeaderMap,
    user: &AuthenticatedUser,
    status: StatusCode,
    form: &ProjectForm,
    errors: Option<&ValidationErrors>,
    notice: Option<&str>,
) -> Response {
    let mut context = admin_context(state, headers, "/admin/projects", user);
    let projects = match state.catalog.all_projects().await {
        Ok(projects) => projects,
        Err(e) => {
            tracing::error!("Failed to load projects: {}", e);
            context.insert("notices", &["Failed to load projects. Please try again."]);
            Vec::new()
        }
    };
    context.insert("projects", &projects);
    context.insert("form", form);
    context.insert("errors", &errors.cloned().unwrap_or_default());
    context.insert("notice", &notice);
    render(state, status, "admin/projects.html", &context)
}

/// GET /admin/projects
pub async fn projects(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: AuthenticatedUser,
    Query(query): Query<NoticeQuery>,
) -> Response {
    let notice = notice_text(query.notice.as_deref());
    projects_page(&state, &headers, &user, StatusCode::OK, &ProjectForm::default(), None, notice).await
}

/// POST /admin/projects
pub async fn create_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: AuthenticatedUser,
    Form(form): Form<ProjectForm>,
) -> Response {
    match state.catalog.create_project(&ProjectInput::from(&form)).await {
        Ok(_) => Redirect::to("/admin/projects?notice=created").into_response(),
        Err(CatalogError::Validation(errors)) => {
            projects_page(&state, &headers, &user, StatusCode::BAD_REQUEST, &form, Some(&errors), None).await
        }
        Err(e) => action_failed(&state, &headers, "project", e.into()),
    }
}

/// POST /admin/projects/{id}/delete
pub async fn delete_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    match state.catalog.delete_project(id).await {
        Ok(()) => Redirect::to("/admin/projects?notice=deleted").into_response(),
        Err(e) => action_failed(&state, &headers, "project", e.into()),
    }
}

/// Admin service form; features are one per line
#[derive(Debug, Default, Deserialize, serde::Serialize)]
pub struct ServiceForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub features: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub sort_order: String,
}

impl From<&ServiceForm> for ServiceInput {
    fn from(form: &ServiceForm) -> Self {
        ServiceInput {
            title: form.title.clone(),
            description: form.description.clone(),
            icon: form.icon.clone(),
            features: form
                .features
                .lines()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            price: non_empty(&form.price),
            sort_order: form.sort_order.trim().parse().unwrap_or(0),
        }
    }
}

async fn services_page(
    state: &AppState,
    headers: &HeaderMap,
    user: &AuthenticatedUser,
    status: StatusCode,
    form: &ServiceForm,
    errors: Option<&ValidationErrors>,
    notice: Option<&str>,
) -> Response {
    let mut context = admin_context(state, headers, "/admin/services", user);
    let services = match state.catalog.list_services().await {
        Ok(services) => services,
        Err(e) => {
            tracing::error!("Failed to load services: {}", e);
            context.insert("notices", &["Failed to load services. Please try again."]);
            Vec::new()
        }
    };
    context.insert("services", &services);
    context.insert("form", form);
    context.insert("errors", &errors.cloned().unwrap_or_default());
    context.insert("notice", &notice);
    render(state, status, "admin/services.html", &context)
}

/// GET /admin/services
pub async fn services(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: AuthenticatedUser,
    Query(query): Query<NoticeQuery>,
) -> Response {
    let notice = notice_text(query.notice.as_deref());
    services_page(&state, &headers, &user, StatusCode::OK, &ServiceForm::default(), None, notice).await
}

/// POST /admin/services
pub async fn create_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: AuthenticatedUser,
    Form(form): Form<ServiceForm>,
) -> Response {
    match state.catalog.create_service(&ServiceInput::from(&form)).await {
        Ok(_) => Redirect::to("/admin/services?notice=created").into_response(),
        Err(CatalogError::Validation(errors)) => {
            services_page(&state, &headers, &user, StatusCode::BAD_REQUEST, &form, Some(&errors), None).await
        }
        Err(e) => action_failed(&state, &headers, "service", e.into()),
    }
}

/// POST /admin/services/{id}/delete
pub async fn delete_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    match state.catalog.delete_service(id).await {
        Ok(()) => Redirect::to("/admin/services?notice=deleted").into_response(),
        Err(e) => action_failed(&state, &headers, "service", e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_form_splits_lists() {
        let form = ProjectForm {
            title: "Site".into(),
            technologies: "Rust, Axum ,, SQLite".into(),
            featured: Some("on".into()),
            live_url: "  ".into(),
            repository_url: "https://git.example.com/site".into(),
            ..Default::default()
        };
        let input = ProjectInput::from(&form);
        assert_eq!(input.technologies, vec!["Rust", "Axum", "SQLite"]);
        assert!(input.featured);
        assert_eq!(input.links.live, None);
        assert_eq!(input.links.repository.as_deref(), Some("https://git.example.com/site"));
    }

    #[test]
    fn test_service_form_features_per_line() {
        let form = ServiceForm {
            features: "Design\n\n  Build  \nLaunch".into(),
            sort_order: "x".into(),
            ..Default::default()
        };
        let input = ServiceInput::from(&form);
        assert_eq!(input.features, vec!["Design", "Build", "Launch"]);
        assert_eq!(input.sort_order, 0);
        assert_eq!(input.price, None);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(59), "0m");
        assert_eq!(format_uptime(3 * 3600 + 120), "3h 2m");
        assert_eq!(format_uptime(2 * 86_400 + 5 * 3600), "2d 5h");
    }

    #[test]
    fn test_notice_text() {
        assert_eq!(notice_text(Some("deleted")), Some("Deleted."));
        assert_eq!(notice_text(Some("<script>")), None);
        assert_eq!(notice_text(None), None);
    }
}
