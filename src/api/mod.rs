//! API layer - HTTP handlers and routing
//!
//! JSON endpoints live under `/api`:
//! - Contact form and submissions
//! - Newsletter subscription and broadcast
//! - Auth (login, first-run registration, password reset)
//! - Projects, services, testimonials and blog posts
//! - Admin dashboard stats and public site info
//!
//! The HTML site from `crate::web` is merged into the same router.

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod contact;
pub mod extract;
pub mod middleware;
pub mod newsletter;
pub mod posts;
pub mod responses;
pub mod site;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser, ClientIp, RequestStats};

/// Build the JSON API router (mounted at `/api`)
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(contact::protected_router())
        .merge(newsletter::protected_router())
        .merge(auth::protected_router())
        .merge(catalog::protected_router())
        .merge(posts::protected_router())
        .merge(admin::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    Router::new()
        .merge(contact::public_router())
        .merge(newsletter::public_router())
        .merge(auth::public_router())
        .merge(catalog::public_router())
        .merge(posts::public_router())
        .merge(site::router())
        .merge(protected_routes)
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    // Credentials cannot be combined with a wildcard origin
    if cors_origin.trim() == "*" {
        return cors.allow_origin(AllowOrigin::any());
    }
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin).allow_credentials(true),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS origin '{}': {}", cors_origin, e);
            cors
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .merge(crate::web::router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        // Outermost so every request is counted
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_accepts_any_configured_origin() {
        // None of these may panic when the layer is built
        let _ = cors_layer("http://localhost:3000");
        let _ = cors_layer("*");
        let _ = cors_layer("bad\norigin");
    }
}
