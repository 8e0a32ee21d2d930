//! Newsletter subscriber model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberStatus {
    #[default]
    Active,
    Unsubscribed,
}

impl std::fmt::Display for SubscriberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Unsubscribed => write!(f, "unsubscribed"),
        }
    }
}

impl std::str::FromStr for SubscriberStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "unsubscribed" => Ok(Self::Unsubscribed),
            _ => Err(format!("Invalid subscriber status: {}", s)),
        }
    }
}

/// Newsletter subscriber
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub id: i64,
    /// Email address (unique, stored lowercase)
    pub email: String,
    pub status: SubscriberStatus,
    pub created_at: DateTime<Utc>,
    pub last_email_sent: Option<DateTime<Utc>>,
}

/// Subscribe / unsubscribe payload
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SubscribeInput {
    #[serde(default)]
    pub email: String,
}

/// Broadcast request; `content` is Markdown
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewsletterInput {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub content: String,
}

/// Outcome of a broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReport {
    pub sent: usize,
    pub failed: usize,
}
