//! HTML site
//!
//! Server-rendered pages for visitors and the back-office:
//! - Tera templates and static assets embedded in the binary
//! - Public pages, lead-capture form posts and the theme preference
//! - Login, logout and password reset
//! - Admin pages behind the `auth_token` cookie

mod account;
mod admin;
mod assets;
mod pages;

use anyhow::Result;
use axum::{
    http::{header, HeaderMap, StatusCode},
    middleware as axum_middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use rust_embed::RustEmbed;
use serde::Serialize;
use std::error::Error as StdError;
use tera::{Context, Tera};

use crate::api::middleware::{self, cookie_value, AppState};

pub use assets::serve_asset;

/// Page templates
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct TemplateAssets;

/// Embedded template registry
pub struct Templates {
    tera: Tera,
}

impl Templates {
    /// Load every embedded template; inheritance is resolved once all are added
    pub fn new() -> Result<Self> {
        let mut templates = Vec::new();
        for name in TemplateAssets::iter() {
            let Some(file) = TemplateAssets::get(&name) else {
                continue;
            };
            let content = String::from_utf8(file.data.into_owned())
                .map_err(|e| anyhow::anyhow!("Template {} is not UTF-8: {}", name, e))?;
            templates.push((name.to_string(), content));
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| anyhow::anyhow!("Failed to load templates: {}", describe(&e)))?;
        tracing::debug!("Loaded {} templates", tera.get_template_names().count());
        Ok(Self { tera })
    }

    pub fn render(&self, template: &str, context: &Context) -> Result<String> {
        self.tera
            .render(template, context)
            .map_err(|e| anyhow::anyhow!("Failed to render '{}': {}", template, describe(&e)))
    }
}

/// Error message with its causes; Tera nests the useful part
fn describe(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

/// Colour scheme chosen by the visitor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub const COOKIE: &'static str = "theme";

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        cookie_value(headers, Self::COOKIE)
            .and_then(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

/// Context with the variables every page uses
pub(crate) fn base_context(state: &AppState, headers: &HeaderMap, path: &str) -> Context {
    let site = &state.config.site;
    let mut context = Context::new();
    context.insert("site_name", &site.name);
    context.insert("site_tagline", &site.tagline);
    context.insert("contact_email", &site.contact_email);
    context.insert("theme", &Theme::from_headers(headers));
    context.insert("request_path", path);
    context.insert("year", &chrono::Utc::now().format("%Y").to_string());
    context
}

/// Render a page, falling back to the error template and then to plain text
pub(crate) fn render(state: &AppState, status: StatusCode, template: &str, context: &Context) -> Response {
    match state.templates.render(template, context) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("{:#}", e);
            let mut error_context = context.clone();
            error_context.insert("status", &500);
            error_context.insert("message", "Something went wrong. Please try again.");
            match state.templates.render("error.html", &error_context) {
                Ok(html) => (StatusCode::INTERNAL_SERVER_ERROR, Html(html)).into_response(),
                Err(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    "Something went wrong. Please try again.",
                )
                    .into_response(),
            }
        }
    }
}

/// Error page with the given status and message
pub(crate) fn error_page(state: &AppState, headers: &HeaderMap, status: StatusCode, message: &str) -> Response {
    let mut context = base_context(state, headers, "");
    context.insert("status", &status.as_u16());
    context.insert("message", message);
    render(state, status, "error.html", &context)
}

/// Only same-site absolute paths are accepted as redirect targets
pub(crate) fn safe_redirect_target(target: Option<&str>, default: &str) -> String {
    match target.map(str::trim) {
        Some(t) if t.starts_with('/') && !t.starts_with("//") && !t.contains('\\') => t.to_string(),
        _ => default.to_string(),
    }
}

async fn not_found(
    axum::extract::State(state): axum::extract::State<AppState>,
    headers: HeaderMap,
) -> Response {
    error_page(&state, &headers, StatusCode::NOT_FOUND, "The page you are looking for does not exist.")
}

/// Build the HTML router
pub fn router(state: AppState) -> Router<AppState> {
    let admin_routes = Router::new()
        .route("/admin", get(admin::dashboard))
        .route("/admin/contacts", get(admin::contacts))
        .route("/admin/contacts/{id}/status", post(admin::update_contact_status))
        .route("/admin/contacts/{id}/delete", post(admin::delete_contact))
        .route("/admin/subscribers", get(admin::subscribers))
        .route("/admin/newsletter", post(admin::send_newsletter))
        .route("/admin/projects", get(admin::projects).post(admin::create_project))
        .route("/admin/projects/{id}/delete", post(admin::delete_project))
        .route("/admin/services", get(admin::services).post(admin::create_service))
        .route("/admin/services/{id}/delete", post(admin::delete_service))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_admin_page,
        ));

    Router::new()
        .route("/", get(pages::home))
        .route("/about", get(pages::about))
        .route("/services", get(pages::services))
        .route("/portfolio", get(pages::portfolio))
        .route("/portfolio/{id}", get(pages::project_detail))
        .route("/blog", get(pages::blog))
        .route("/blog/{slug}", get(pages::post_detail))
        .route("/contact", get(pages::contact_form).post(pages::submit_contact))
        .route("/newsletter", post(pages::subscribe))
        .route("/unsubscribe", get(pages::unsubscribe_form).post(pages::unsubscribe))
        .route("/theme", post(pages::set_theme))
        .route("/login", get(account::login_form).post(account::login))
        .route("/register", post(account::register))
        .route("/logout", post(account::logout))
        .route(
            "/reset-password",
            get(account::reset_form).post(account::reset_password),
        )
        .route("/assets/{*path}", get(serve_asset))
        .merge(admin_routes)
        .fallback(not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_embedded_templates_load() {
        let templates = Templates::new().unwrap();
        let names: Vec<&str> = templates.tera.get_template_names().collect();
        for expected in ["base.html", "home.html", "contact.html", "admin/dashboard.html", "error.html"] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_error_template_renders() {
        let templates = Templates::new().unwrap();
        let mut context = Context::new();
        context.insert("site_name", "Studio");
        context.insert("site_tagline", "");
        context.insert("contact_email", "hi@example.com");
        context.insert("theme", &Theme::Dark);
        context.insert("request_path", "/missing");
        context.insert("year", "2026");
        context.insert("status", &404);
        context.insert("message", "Not here <b>");
        let html = templates.render("error.html", &context).unwrap();
        assert!(html.contains("404"));
        assert!(html.contains("Not here &lt;b&gt;"));
        assert!(html.contains(r#"data-theme="dark""#));
    }

    #[test]
    fn test_theme_from_cookie() {
        let mut headers = HeaderMap::new();
        assert_eq!(Theme::from_headers(&headers), Theme::Light);
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(Theme::from_headers(&headers), Theme::Dark);
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=neon"));
        assert_eq!(Theme::from_headers(&headers), Theme::Light);
    }

    #[test]
    fn test_safe_redirect_target() {
        assert_eq!(safe_redirect_target(Some("/admin/contacts"), "/admin"), "/admin/contacts");
        assert_eq!(safe_redirect_target(Some("//evil.example"), "/admin"), "/admin");
        assert_eq!(safe_redirect_target(Some("https://evil.example"), "/admin"), "/admin");
        assert_eq!(safe_redirect_target(None, "/"), "/");
    }
}
