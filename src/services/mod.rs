//! Services layer - Business logic
//!
//! Services own the rules: validation, cache use and invalidation, upstream
//! forwarding and mail. Handlers stay thin and map service errors to HTTP.

pub mod blog;
pub mod catalog;
pub mod contact;
pub mod mailer;
pub mod markdown;
pub mod newsletter;
pub mod password;
pub mod portfolio;
pub mod rate_limiter;
pub mod user;
pub mod validation;

pub use blog::{generate_slug, BlogError, BlogService};
pub use catalog::{CatalogError, CatalogService};
pub use contact::{ContactOutcome, ContactService, ContactServiceError};
pub use mailer::{create_mailer, DynMailer, LogMailer, Mailer, OutgoingMail, SmtpMailer};
pub use markdown::MarkdownRenderer;
pub use newsletter::{NewsletterError, NewsletterService, SubscribeOutcome};
pub use password::{hash_password, verify_password};
pub use rate_limiter::{Bucket, RateLimiter};
pub use user::{UserService, UserServiceError};
pub use validation::ValidationErrors;
