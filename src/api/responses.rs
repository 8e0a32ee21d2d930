//! Shared API response types
//!
//! Response bodies used by more than one endpoint, and by `ApiClient` on the
//! other side of the wire.

use serde::{Deserialize, Serialize};

use crate::models::User;

fn default_true() -> bool {
    true
}

/// Acknowledgement for form submissions and fire-and-forget actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// List envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub user: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCounts {
    pub total: i64,
    pub new: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberCounts {
    pub total: i64,
    pub active: i64,
}

/// Dashboard counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub projects: i64,
    pub services: i64,
    pub posts: i64,
    pub contacts: ContactCounts,
    pub subscribers: SubscriberCounts,
    #[serde(default)]
    pub uptime_seconds: u64,
    #[serde(default)]
    pub total_requests: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteInfoResponse {
    pub name: String,
    pub tagline: String,
    pub contact_email: String,
    pub version: String,
    /// Whether an administrator can still be registered
    pub registration_open: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_tolerates_foreign_bodies() {
        let ack: Ack = serde_json::from_str(r#"{"id": 42}"#).unwrap();
        assert!(ack.success);
        assert!(ack.message.is_empty());
    }

    #[test]
    fn test_list_response_counts_items() {
        let list: ListResponse<i32> = vec![1, 2, 3].into();
        assert_eq!(list.total, 3);
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json["items"], serde_json::json!([1, 2, 3]));
    }
}
