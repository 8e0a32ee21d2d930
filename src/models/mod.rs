//! Data models
//!
//! Database entities and the request payloads that create or update them.

mod contact;
mod post;
mod project;
mod service;
mod session;
mod subscriber;
mod testimonial;
mod user;

pub use contact::{ContactInput, ContactStatus, ContactSubmission, UpdateContactStatusInput};
pub use post::{Post, PostInput};
pub use project::{Project, ProjectFilter, ProjectInput, ProjectLinks, ProjectSort};
pub use service::{Service, ServiceInput};
pub use session::{PasswordReset, Session};
pub use subscriber::{NewsletterInput, SendReport, SubscribeInput, Subscriber, SubscriberStatus};
pub use testimonial::{Testimonial, TestimonialInput};
pub use user::{ForgotPasswordInput, LoginInput, RegisterInput, ResetPasswordInput, User};
