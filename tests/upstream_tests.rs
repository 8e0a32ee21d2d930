//! `ApiClient` and upstream forwarding against a live backend on a local port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use devstudio::api::{build_router, AppState};
use devstudio::cache::{Cache, MemoryCache};
use devstudio::client::ApiClient;
use devstudio::config::Config;
use devstudio::db::{create_test_pool, migrations};
use devstudio::models::{
    ContactInput, ContactStatus, LoginInput, NewsletterInput, PostInput, ProjectFilter,
    ProjectInput, RegisterInput, SendReport, ServiceInput, TestimonialInput,
};
use devstudio::services::LogMailer;

async fn test_state(config: Config) -> AppState {
    let pool = create_test_pool().await.unwrap();
    migrations::run_migrations(&pool).await.unwrap();
    let cache = Arc::new(Cache::Memory(MemoryCache::new()));
    AppState::build(pool, config, cache, Arc::new(LogMailer::new())).unwrap()
}

/// Serve a fresh backend on an ephemeral port; returns its `/api` base URL
async fn spawn_backend() -> String {
    let app = build_router(test_state(Config::default()).await);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });
    format!("http://{}/api", addr)
}

fn client(base_url: &str) -> ApiClient {
    ApiClient::new(base_url, None, Duration::from_secs(5)).unwrap()
}

async fn admin_client(base_url: &str) -> ApiClient {
    let session = client(base_url)
        .register(&RegisterInput {
            username: "admin".into(),
            email: "admin@example.com".into(),
            password: "correct horse battery".into(),
        })
        .await
        .unwrap();
    client(base_url).with_token(session.token)
}

fn enquiry() -> ContactInput {
    ContactInput {
        name: "Jane Doe".into(),
        email: "jane@example.com".into(),
        subject: "New website".into(),
        message: "We would like a quote for a mobile app.".into(),
    }
}

#[tokio::test]
async fn test_client_auth_round_trip() {
    let base_url = spawn_backend().await;
    let admin = admin_client(&base_url).await;

    assert_eq!(admin.me().await.unwrap().username, "admin");

    let err = client(&base_url)
        .login(&LoginInput {
            username: "admin".into(),
            password: "wrong password".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));

    let session = client(&base_url)
        .login(&LoginInput {
            username: "admin@example.com".into(),
            password: "correct horse battery".into(),
        })
        .await
        .unwrap();
    assert_eq!(session.user.email, "admin@example.com");

    let again = client(&base_url).with_token(session.token);
    again.logout().await.unwrap();
    assert_eq!(again.me().await.unwrap_err().status(), Some(401));

    let ack = client(&base_url).forgot_password("nobody@example.com").await.unwrap();
    assert!(ack.success);
}

#[tokio::test]
async fn test_client_contact_and_newsletter() {
    let base_url = spawn_backend().await;
    let admin = admin_client(&base_url).await;
    let public = client(&base_url);

    assert!(public.submit_contact(&enquiry()).await.unwrap().success);
    assert_eq!(public.list_submissions(None).await.unwrap_err().status(), Some(401));

    let submissions = admin.list_submissions(None).await.unwrap();
    assert_eq!(submissions.len(), 1);
    let id = submissions[0].id;

    let updated = admin
        .update_submission_status(id, ContactStatus::Responded)
        .await
        .unwrap();
    assert_eq!(updated.status, ContactStatus::Responded);
    assert!(admin.list_submissions(Some(ContactStatus::New)).await.unwrap().is_empty());

    admin.delete_submission(id).await.unwrap();
    assert_eq!(admin.delete_submission(id).await.unwrap_err().status(), Some(404));

    public.subscribe("reader@example.com").await.unwrap();
    let subscribers = admin.list_subscribers().await.unwrap();
    assert_eq!(subscribers.len(), 1);

    let report = admin
        .send_newsletter(&NewsletterInput {
            subject: "Spring update".into(),
            content: "Two new case studies are live.".into(),
        })
        .await
        .unwrap();
    assert_eq!(report, SendReport { sent: 1, failed: 0 });

    public.unsubscribe("reader@example.com").await.unwrap();
    let stats = admin.admin_stats().await.unwrap();
    assert_eq!(stats.contacts.total, 0);
    assert_eq!(stats.subscribers.total, 1);
    assert_eq!(stats.subscribers.active, 0);
}

#[tokio::test]
async fn test_client_content_endpoints() {
    let base_url = spawn_backend().await;
    let admin = admin_client(&base_url).await;
    let public = client(&base_url);

    let input = ProjectInput {
        title: "Harbor Tracker".into(),
        category: "web".into(),
        description: "Live berth occupancy for a marina.".into(),
        technologies: vec!["Rust".into(), "Leaflet".into()],
        featured: true,
        date: "2024-05-01".into(),
        ..Default::default()
    };
    let project = admin.create_project(&input).await.unwrap();
    assert_eq!(public.get_project(project.id).await.unwrap().title, "Harbor Tracker");

    let featured = ProjectFilter {
        featured: Some(true),
        ..Default::default()
    };
    assert_eq!(public.list_projects(&featured).await.unwrap().len(), 1);

    let renamed = admin
        .update_project(
            project.id,
            &ProjectInput {
                title: "Harbor Tracker 2".into(),
                ..input
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.title, "Harbor Tracker 2");
    admin.delete_project(project.id).await.unwrap();
    assert_eq!(public.get_project(project.id).await.unwrap_err().status(), Some(404));

    let err = public
        .create_project(&ProjectInput::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));

    let service = admin
        .create_service(&ServiceInput {
            title: "Audits".into(),
            description: "Performance and security reviews.".into(),
            icon: "shield".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(public.list_services().await.unwrap().iter().any(|s| s.id == service.id));
    admin.delete_service(service.id).await.unwrap();

    admin
        .create_testimonial(&TestimonialInput {
            author: "Mia Chen".into(),
            quote: "Shipped on time.".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(public.list_testimonials().await.unwrap().len(), 1);

    let post = admin
        .create_post(&PostInput {
            title: "Release notes".into(),
            content: "# Hello\n\nFirst **post**.".into(),
            published: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(post.slug, "release-notes");
    assert_eq!(public.list_posts().await.unwrap().len(), 1);
    let fetched = public.get_post("release-notes").await.unwrap();
    assert!(fetched.content_html.contains("<strong>post</strong>"));
}

#[tokio::test]
async fn test_forms_forward_to_configured_upstream() {
    let base_url = spawn_backend().await;
    let admin = admin_client(&base_url).await;

    let mut config = Config::default();
    config.upstream.base_url = Some(base_url.clone());
    config.upstream.token = admin.token().map(str::to_string);

    // The configured token reaches the upstream's protected endpoints
    let forwarding = ApiClient::from_config(&config.upstream).unwrap().unwrap();
    assert_eq!(forwarding.me().await.unwrap().username, "admin");

    let front = TestServer::new(build_router(test_state(config).await)).unwrap();

    let response = front
        .post("/api/contact")
        .json(&json!({
            "name": "Jane Doe",
            "email": "jane@example.com",
            "subject": "New website",
            "message": "We would like a quote for a mobile app."
        }))
        .await;
    assert!(response.status_code().is_success());

    let response = front
        .post("/api/newsletter/subscribe")
        .json(&json!({ "email": "reader@example.com" }))
        .await;
    assert!(response.status_code().is_success());

    assert_eq!(admin.list_submissions(None).await.unwrap().len(), 1);
    assert_eq!(admin.list_subscribers().await.unwrap().len(), 1);

    // Invalid input is rejected locally, before anything is forwarded
    let response = front
        .post("/api/contact")
        .json(&json!({ "name": "J", "email": "x", "subject": "", "message": "" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(admin.list_submissions(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let mut config = Config::default();
    config.upstream.base_url = Some("http://127.0.0.1:9/api".into());
    config.upstream.timeout_seconds = 1;
    let front = TestServer::new(build_router(test_state(config).await)).unwrap();

    let response = front
        .post("/api/newsletter/subscribe")
        .json(&json!({ "email": "reader@example.com" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.json::<Value>()["error"]["code"], "UPSTREAM_ERROR");
}
