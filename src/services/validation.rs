//! Form validation
//!
//! Every lead-capture form and admin write is checked here before it reaches
//! a repository or the upstream API. Failures are collected per field so the
//! caller can report all of them at once.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::models::{
    ContactInput, PostInput, ProjectInput, ServiceInput, TestimonialInput,
};

pub const NAME_MIN: usize = 2;
pub const NAME_MAX: usize = 100;
pub const EMAIL_MAX: usize = 254;
pub const SUBJECT_MIN: usize = 5;
pub const SUBJECT_MAX: usize = 200;
pub const MESSAGE_MIN: usize = 10;
pub const MESSAGE_MAX: usize = 5000;
pub const TITLE_MAX: usize = 200;
pub const PASSWORD_MIN: usize = 8;

static EMAIL_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .map_err(|e| tracing::error!("Email pattern failed to compile: {}", e))
        .ok()
});

/// Field name to message, in field-name order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Error for a single field
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record a failure; the first message per field wins
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn check_length(&mut self, field: &str, label: &str, value: &str, min: usize, max: usize) {
        let len = value.trim().chars().count();
        if len < min {
            if min == 1 {
                self.add(field, format!("{} is required", label));
            } else {
                self.add(field, format!("{} must be at least {} characters", label, min));
            }
        } else if len > max {
            self.add(field, format!("{} must be at most {} characters", label, max));
        }
    }

    fn check_required(&mut self, field: &str, label: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, format!("{} is required", label));
        }
    }

    fn check_email(&mut self, field: &str, value: &str) {
        if let Some(message) = email_error(value) {
            self.add(field, message);
        }
    }
}

/// Reason an address is rejected, if any
pub fn email_error(email: &str) -> Option<&'static str> {
    let email = email.trim();
    if email.is_empty() {
        Some("Email is required")
    } else if email.len() > EMAIL_MAX {
        Some("Email must be at most 254 characters")
    } else if !EMAIL_RE.as_ref().is_some_and(|re| re.is_match(email)) {
        Some("Please enter a valid email address")
    } else {
        None
    }
}

pub fn is_valid_email(email: &str) -> bool {
    email_error(email).is_none()
}

/// Validate a contact form and return it trimmed
pub fn validate_contact(input: &ContactInput) -> Result<ContactInput, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check_length("name", "Name", &input.name, NAME_MIN, NAME_MAX);
    errors.check_email("email", &input.email);
    errors.check_length("subject", "Subject", &input.subject, SUBJECT_MIN, SUBJECT_MAX);
    errors.check_length("message", "Message", &input.message, MESSAGE_MIN, MESSAGE_MAX);
    errors.into_result()?;

    Ok(ContactInput {
        name: input.name.trim().to_string(),
        email: input.email.trim().to_string(),
        subject: input.subject.trim().to_string(),
        message: input.message.trim().to_string(),
    })
}

/// Validate a newsletter address and return it normalized (trimmed, lowercase)
pub fn validate_subscriber_email(email: &str) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check_email("email", email);
    errors.into_result()?;
    Ok(email.trim().to_lowercase())
}

/// Validate a project and return its parsed date
pub fn validate_project(input: &ProjectInput) -> Result<NaiveDate, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check_length("title", "Title", &input.title, 1, TITLE_MAX);
    errors.check_required("category", "Category", &input.category);
    errors.check_required("description", "Description", &input.description);

    let date = NaiveDate::parse_from_str(input.date.trim(), "%Y-%m-%d");
    if date.is_err() {
        errors.add("date", "Date must be formatted as YYYY-MM-DD");
    }
    errors.into_result()?;

    date.map_err(|_| ValidationErrors::single("date", "Date must be formatted as YYYY-MM-DD"))
}

pub fn validate_service(input: &ServiceInput) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check_length("title", "Title", &input.title, 1, TITLE_MAX);
    errors.check_required("description", "Description", &input.description);
    errors.check_required("icon", "Icon", &input.icon);
    errors.into_result()
}

pub fn validate_testimonial(input: &TestimonialInput) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check_length("author", "Author", &input.author, 1, NAME_MAX);
    errors.check_required("quote", "Quote", &input.quote);
    errors.into_result()
}

pub fn validate_post(input: &PostInput) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check_length("title", "Title", &input.title, 1, TITLE_MAX);
    errors.check_required("content", "Content", &input.content);
    if let Some(slug) = input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        if !slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            errors.add("slug", "Slug may only contain lowercase letters, digits and hyphens");
        }
    }
    errors.into_result()
}

pub fn validate_password(password: &str) -> Result<(), ValidationErrors> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(ValidationErrors::single(
            "password",
            format!("Password must be at least {} characters", PASSWORD_MIN),
        ));
    }
    Ok(())
}

pub fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check_length("username", "Username", username, 3, 50);
    if !username
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        errors.add("username", "Username may only contain letters, digits, '_' and '-'");
    }
    errors.check_email("email", email);
    if let Err(e) = validate_password(password) {
        for (field, message) in e.fields {
            errors.add(&field, message);
        }
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn contact(name: &str, email: &str, subject: &str, message: &str) -> ContactInput {
        ContactInput {
            name: name.to_string(),
            email: email.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_valid_contact_is_trimmed() {
        let ok = validate_contact(&contact(
            "  Jane Doe ",
            " jane@example.com",
            "Website redesign",
            "We need a new marketing site.  ",
        ))
        .unwrap();
        assert_eq!(ok.name, "Jane Doe");
        assert_eq!(ok.email, "jane@example.com");
        assert_eq!(ok.message, "We need a new marketing site.");
    }

    #[test]
    fn test_short_message_is_rejected() {
        let err = validate_contact(&contact("Jane", "jane@example.com", "Hello there", "too short"))
            .unwrap_err();
        assert_eq!(err.fields().len(), 1);
        assert_eq!(err.get("message"), Some("Message must be at least 10 characters"));
    }

    #[test]
    fn test_all_contact_fields_reported() {
        let err = validate_contact(&contact("J", "not-an-email", "Hi", "")).unwrap_err();
        for field in ["name", "email", "subject", "message"] {
            assert!(err.get(field).is_some(), "missing error for {}", field);
        }
    }

    #[test]
    fn test_contact_upper_bounds() {
        let err = validate_contact(&contact(
            &"n".repeat(101),
            "jane@example.com",
            &"s".repeat(201),
            &"m".repeat(5001),
        ))
        .unwrap_err();
        assert!(err.get("name").unwrap().contains("at most 100"));
        assert!(err.get("subject").unwrap().contains("at most 200"));
        assert!(err.get("message").unwrap().contains("at most 5000"));
    }

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("hello@devstudio.io"));
        assert!(is_valid_email("first.last+tag@sub.example.co.uk"));
        assert!(!is_valid_email("hello"));
        assert!(!is_valid_email("hello@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("hello@localhost"));
        assert!(!is_valid_email("a b@example.com"));
        let long = format!("{}@example.com", "a".repeat(250));
        assert_eq!(email_error(&long), Some("Email must be at most 254 characters"));
    }

    #[test]
    fn test_subscriber_email_normalized() {
        assert_eq!(
            validate_subscriber_email("  News@Example.COM ").unwrap(),
            "news@example.com"
        );
        assert!(validate_subscriber_email("nope").is_err());
    }

    #[test]
    fn test_project_date_must_be_iso() {
        let mut input = ProjectInput {
            title: "Shop".into(),
            category: "Web".into(),
            description: "Online store".into(),
            date: "2024-02-30".into(),
            ..Default::default()
        };
        assert!(validate_project(&input).unwrap_err().get("date").is_some());

        input.date = "03/01/2024".into();
        assert!(validate_project(&input).is_err());

        input.date = "2024-03-01".into();
        assert_eq!(
            validate_project(&input).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_service_and_testimonial_required_fields() {
        let err = validate_service(&ServiceInput::default()).unwrap_err();
        assert_eq!(err.fields().len(), 3);

        let err = validate_testimonial(&TestimonialInput::default()).unwrap_err();
        assert!(err.get("author").is_some());
        assert!(err.get("quote").is_some());
    }

    #[test]
    fn test_post_slug_charset() {
        let mut input = PostInput {
            title: "Hello".into(),
            content: "Body".into(),
            slug: Some("Hello World".into()),
            ..Default::default()
        };
        assert!(validate_post(&input).unwrap_err().get("slug").is_some());
        input.slug = Some("hello-world".into());
        assert!(validate_post(&input).is_ok());
    }

    #[test]
    fn test_registration() {
        assert!(validate_registration("admin", "admin@example.com", "longenough").is_ok());
        let err = validate_registration("a", "bad", "short").unwrap_err();
        assert!(err.get("username").is_some());
        assert!(err.get("email").is_some());
        assert!(err.get("password").is_some());
    }

    #[test]
    fn test_errors_serialize_as_map() {
        let err = ValidationErrors::single("message", "too short");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({ "message": "too short" })
        );
        assert_eq!(err.to_string(), "message: too short");
    }

    proptest! {
        #[test]
        fn prop_message_length_boundary(len in 0usize..30) {
            let message = "x".repeat(len);
            let result = validate_contact(&contact("Jane", "jane@example.com", "Hello there", &message));
            prop_assert_eq!(result.is_ok(), len >= MESSAGE_MIN);
        }
    }
}
