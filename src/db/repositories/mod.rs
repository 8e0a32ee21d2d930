//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod contact;
pub mod post;
pub mod project;
pub mod service;
pub mod session;
pub mod subscriber;
pub mod testimonial;
pub mod user;

pub use contact::{ContactRepository, SqlxContactRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use project::{ProjectRepository, SqlxProjectRepository};
pub use service::{ServiceRepository, SqlxServiceRepository};
pub use session::{
    PasswordResetRepository, SessionRepository, SqlxPasswordResetRepository,
    SqlxSessionRepository,
};
pub use subscriber::{SqlxSubscriberRepository, SubscriberRepository};
pub use testimonial::{SqlxTestimonialRepository, TestimonialRepository};
pub use user::{SqlxUserRepository, UserRepository};

use anyhow::{Context, Result};

/// Serialize a list column
pub(crate) fn encode_list(items: &[String]) -> Result<String> {
    serde_json::to_string(items).context("Failed to encode list column")
}

/// Parse a list column; malformed text reads as empty
pub(crate) fn decode_list(raw: String) -> Vec<String> {
    serde_json::from_str(&raw).unwrap_or_default()
}
