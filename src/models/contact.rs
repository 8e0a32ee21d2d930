//! Contact submission model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Triage state of a contact submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    #[default]
    New,
    Read,
    Responded,
    Archived,
}

impl ContactStatus {
    pub const ALL: [ContactStatus; 4] = [Self::New, Self::Read, Self::Responded, Self::Archived];
}

impl std::fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Read => write!(f, "read"),
            Self::Responded => write!(f, "responded"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for ContactStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(Self::New),
            "read" => Ok(Self::Read),
            "responded" => Ok(Self::Responded),
            "archived" => Ok(Self::Archived),
            _ => Err(format!("Invalid contact status: {}", s)),
        }
    }
}

/// Stored contact form submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
}

/// Contact form payload
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ContactInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateContactStatusInput {
    pub status: ContactStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_roundtrip_through_display() {
        for status in ContactStatus::ALL {
            assert_eq!(ContactStatus::from_str(&status.to_string()).unwrap(), status);
        }
        assert!(ContactStatus::from_str("deleted").is_err());
    }

    #[test]
    fn test_status_json() {
        let input: UpdateContactStatusInput =
            serde_json::from_str(r#"{"status":"archived"}"#).unwrap();
        assert_eq!(input.status, ContactStatus::Archived);
    }
}
