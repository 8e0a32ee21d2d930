//! Typed HTTP client for the site's REST API
//!
//! Used in two places: lead-capture forms forward to an upstream backend
//! through it when one is configured, and it doubles as a client for any
//! deployment of this server (`/api` endpoints).
//!
//! ```rust,ignore
//! let client = ApiClient::new("https://studio.example.com/api", None, Duration::from_secs(10))?;
//! let projects = client.list_projects(&ProjectFilter::default()).await?;
//! ```

use reqwest::{Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use crate::api::responses::{Ack, ListResponse, LoginResponse, StatsResponse};
use crate::config::UpstreamConfig;
use crate::models::{
    ContactInput, ContactStatus, ContactSubmission, LoginInput, NewsletterInput, Post, PostInput,
    Project, ProjectFilter, ProjectInput, RegisterInput, ResetPasswordInput, SendReport, Service,
    ServiceInput, Subscriber, Testimonial, TestimonialInput, UpdateContactStatusInput, User,
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// HTTP status when the server answered with an error
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("devstudio/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// Client for the configured upstream, or `None` in local mode
    pub fn from_config(config: &UpstreamConfig) -> ClientResult<Option<Self>> {
        match config.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(Some(Self::new(
                url,
                config.token.clone(),
                Duration::from_secs(config.timeout_seconds),
            )?)),
            _ => Ok(None),
        }
    }

    /// Same client, authenticated with `token`
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let response = check_status(builder.send().await?).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// For endpoints whose body is informational only
    async fn send_ack(&self, builder: RequestBuilder) -> ClientResult<Ack> {
        let response = check_status(builder.send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes).unwrap_or_else(|_| Ack::ok("Accepted")))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(self.request(Method::GET, path)).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        self.send(self.request(Method::PUT, path).json(body)).await
    }

    async fn delete(&self, path: &str) -> ClientResult<Ack> {
        self.send_ack(self.request(Method::DELETE, path)).await
    }

    // Contact

    pub async fn submit_contact(&self, input: &ContactInput) -> ClientResult<Ack> {
        self.send_ack(self.request(Method::POST, "/contact").json(input))
            .await
    }

    pub async fn list_submissions(&self, status: Option<ContactStatus>) -> ClientResult<Vec<ContactSubmission>> {
        let mut builder = self.request(Method::GET, "/contact/submissions");
        if let Some(status) = status {
            builder = builder.query(&[("status", status.to_string())]);
        }
        let list: ListResponse<ContactSubmission> = self.send(builder).await?;
        Ok(list.items)
    }

    pub async fn update_submission_status(&self, id: i64, status: ContactStatus) -> ClientResult<ContactSubmission> {
        self.put(
            &format!("/contact/submissions/{}/status", id),
            &UpdateContactStatusInput { status },
        )
        .await
    }

    pub async fn delete_submission(&self, id: i64) -> ClientResult<Ack> {
        self.delete(&format!("/contact/submissions/{}", id)).await
    }

    // Newsletter

    pub async fn subscribe(&self, email: &str) -> ClientResult<Ack> {
        let body = serde_json::json!({ "email": email });
        self.send_ack(self.request(Method::POST, "/newsletter/subscribe").json(&body))
            .await
    }

    pub async fn unsubscribe(&self, email: &str) -> ClientResult<Ack> {
        let body = serde_json::json!({ "email": email });
        self.send_ack(self.request(Method::POST, "/newsletter/unsubscribe").json(&body))
            .await
    }

    pub async fn list_subscribers(&self) -> ClientResult<Vec<Subscriber>> {
        let list: ListResponse<Subscriber> = self.get("/newsletter/subscribers").await?;
        Ok(list.items)
    }

    pub async fn send_newsletter(&self, input: &NewsletterInput) -> ClientResult<SendReport> {
        self.post("/newsletter/send", input).await
    }

    // Auth

    pub async fn login(&self, input: &LoginInput) -> ClientResult<LoginResponse> {
        self.post("/auth/login", input).await
    }

    /// Creates the first administrator and returns its session
    pub async fn register(&self, input: &RegisterInput) -> ClientResult<LoginResponse> {
        self.post("/auth/register", input).await
    }

    pub async fn forgot_password(&self, email: &str) -> ClientResult<Ack> {
        let body = serde_json::json!({ "email": email });
        self.send_ack(self.request(Method::POST, "/auth/forgot-password").json(&body))
            .await
    }

    pub async fn reset_password(&self, input: &ResetPasswordInput) -> ClientResult<Ack> {
        self.send_ack(self.request(Method::POST, "/auth/reset-password").json(input))
            .await
    }

    pub async fn logout(&self) -> ClientResult<Ack> {
        self.send_ack(self.request(Method::POST, "/auth/logout")).await
    }

    pub async fn me(&self) -> ClientResult<User> {
        self.get("/auth/me").await
    }

    // Content

    pub async fn list_projects(&self, filter: &ProjectFilter) -> ClientResult<Vec<Project>> {
        let list: ListResponse<Project> = self
            .send(self.request(Method::GET, "/projects").query(filter))
            .await?;
        Ok(list.items)
    }

    pub async fn get_project(&self, id: i64) -> ClientResult<Project> {
        self.get(&format!("/projects/{}", id)).await
    }

    pub async fn create_project(&self, input: &ProjectInput) -> ClientResult<Project> {
        self.post("/projects", input).await
    }

    pub async fn update_project(&self, id: i64, input: &ProjectInput) -> ClientResult<Project> {
        self.put(&format!("/projects/{}", id), input).await
    }

    pub async fn delete_project(&self, id: i64) -> ClientResult<Ack> {
        self.delete(&format!("/projects/{}", id)).await
    }

    pub async fn list_services(&self) -> ClientResult<Vec<Service>> {
        let list: ListResponse<Service> = self.get("/services").await?;
        Ok(list.items)
    }

    pub async fn create_service(&self, input: &ServiceInput) -> ClientResult<Service> {
        self.post("/services", input).await
    }

    pub async fn update_service(&self, id: i64, input: &ServiceInput) -> ClientResult<Service> {
        self.put(&format!("/services/{}", id), input).await
    }

    pub async fn delete_service(&self, id: i64) -> ClientResult<Ack> {
        self.delete(&format!("/services/{}", id)).await
    }

    pub async fn list_testimonials(&self) -> ClientResult<Vec<Testimonial>> {
        let list: ListResponse<Testimonial> = self.get("/testimonials").await?;
        Ok(list.items)
    }

    pub async fn create_testimonial(&self, input: &TestimonialInput) -> ClientResult<Testimonial> {
        self.post("/testimonials", input).await
    }

    pub async fn list_posts(&self) -> ClientResult<Vec<Post>> {
        let list: ListResponse<Post> = self.get("/posts").await?;
        Ok(list.items)
    }

    pub async fn get_post(&self, slug: &str) -> ClientResult<Post> {
        self.get(&format!("/posts/{}", urlencoding::encode(slug))).await
    }

    pub async fn create_post(&self, input: &PostInput) -> ClientResult<Post> {
        self.post("/posts", input).await
    }

    pub async fn admin_stats(&self) -> ClientResult<StatsResponse> {
        self.get("/admin/stats").await
    }
}

/// Turn non-2xx responses into `ClientError::Status`, preferring the
/// `error.message` field of an API error body
async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.canonical_reason().unwrap_or("Unknown error").to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        });

    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_local_mode() {
        let config = UpstreamConfig::default();
        assert!(ApiClient::from_config(&config).unwrap().is_none());

        let blank = UpstreamConfig {
            base_url: Some("  ".into()),
            ..Default::default()
        };
        assert!(ApiClient::from_config(&blank).unwrap().is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = UpstreamConfig {
            base_url: Some("https://backend.example.com/api/".into()),
            token: Some(String::new()),
            timeout_seconds: 5,
        };
        let client = ApiClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.base_url(), "https://backend.example.com/api");
        assert!(client.token.is_none());
        assert_eq!(client.with_token("t").token.as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_http_error() {
        let client = ApiClient::new("http://127.0.0.1:9", None, Duration::from_millis(500)).unwrap();
        let err = client.subscribe("a@example.com").await.unwrap_err();
        assert!(matches!(err, ClientError::Http(_)));
        assert_eq!(err.status(), None);
    }
}
