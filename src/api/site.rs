//! Public site information API
//!
//! - GET /api/site/info - Site identity for front ends (no authentication)

use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::SiteInfoResponse;

pub fn router() -> Router<AppState> {
    Router::new().route("/site/info", get(get_site_info))
}

/// GET /api/site/info
async fn get_site_info(State(state): State<AppState>) -> Result<Json<SiteInfoResponse>, ApiError> {
    let site = &state.config.site;
    Ok(Json(SiteInfoResponse {
        name: site.name.clone(),
        tagline: site.tagline.clone(),
        contact_email: site.contact_email.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        registration_open: state.user_service.registration_open().await?,
    }))
}
