//! Testimonial model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client quote shown on the home page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    pub id: i64,
    pub author: String,
    pub role: String,
    pub company: String,
    pub quote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TestimonialInput {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub avatar: Option<String>,
}
