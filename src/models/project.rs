//! Portfolio project model
//!
//! This module provides:
//! - `Project` entity shown on the portfolio grid and detail page
//! - `ProjectInput` for admin create/update
//! - `ProjectFilter` / `ProjectSort` query parameters for the grid

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A portfolio project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub description: String,
    pub technologies: Vec<String>,
    /// Cover image URL
    pub image: String,
    pub featured: bool,
    /// Delivery date
    pub date: NaiveDate,
    #[serde(default)]
    pub gallery: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub links: ProjectLinks,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// External links of a project
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

/// Admin input for creating or replacing a project.
///
/// `date` stays a string here so a malformed value is reported as a field
/// error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub gallery: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub links: ProjectLinks,
}

/// Sort order for the portfolio grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectSort {
    /// Most recent first
    #[default]
    Newest,
    Oldest,
    /// Title A to Z
    Title,
}

impl fmt::Display for ProjectSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Newest => write!(f, "newest"),
            Self::Oldest => write!(f, "oldest"),
            Self::Title => write!(f, "title"),
        }
    }
}

impl FromStr for ProjectSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "title" => Ok(Self::Title),
            _ => Err(format!("Invalid sort order: {}", s)),
        }
    }
}

/// Portfolio grid query (`?category=web&featured=true&sort=title`)
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ProjectFilter {
    /// Category name; `all` means no filter
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub featured: Option<bool>,
    #[serde(default)]
    pub technology: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: ProjectSort,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_sort_parse() {
        assert_eq!("newest".parse::<ProjectSort>().unwrap(), ProjectSort::Newest);
        assert_eq!("TITLE".parse::<ProjectSort>().unwrap(), ProjectSort::Title);
        assert!("random".parse::<ProjectSort>().is_err());
        assert_eq!(ProjectSort::default(), ProjectSort::Newest);
    }

    #[test]
    fn test_project_input_missing_fields_default() {
        let input: ProjectInput = serde_json::from_str(r#"{"title":"Site"}"#).unwrap();
        assert_eq!(input.title, "Site");
        assert!(input.category.is_empty());
        assert!(input.technologies.is_empty());
        assert!(!input.featured);
    }

    #[test]
    fn test_links_skip_empty() {
        let json = serde_json::to_string(&ProjectLinks::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
