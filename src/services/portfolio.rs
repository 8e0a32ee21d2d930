//! Portfolio grid filtering
//!
//! Pure functions over an in-memory project list. Repositories hand back the
//! full catalogue; the grid narrows and orders it here.

use crate::models::{Project, ProjectFilter, ProjectSort};

/// Category value that disables category filtering
pub const ALL_CATEGORIES: &str = "all";

/// Apply a filter and sort order to a project list.
///
/// - `category`: case-insensitive exact match, `all` or empty means any
/// - `featured`: `Some(true)` keeps only featured projects, `Some(false)` only the rest
/// - `technology`: keeps projects listing it, case-insensitive
/// - `search`: case-insensitive substring of title or description
pub fn filter_projects(projects: &[Project], filter: &ProjectFilter) -> Vec<Project> {
    let category = filter
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(ALL_CATEGORIES))
        .map(str::to_lowercase);
    let technology = filter
        .technology
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase);
    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut result: Vec<Project> = projects
        .iter()
        .filter(|p| {
            category
                .as_ref()
                .map_or(true, |c| p.category.to_lowercase() == *c)
        })
        .filter(|p| filter.featured.map_or(true, |f| p.featured == f))
        .filter(|p| {
            technology.as_ref().map_or(true, |t| {
                p.technologies.iter().any(|tech| tech.to_lowercase() == *t)
            })
        })
        .filter(|p| {
            search.as_ref().map_or(true, |s| {
                p.title.to_lowercase().contains(s.as_str())
                    || p.description.to_lowercase().contains(s.as_str())
            })
        })
        .cloned()
        .collect();

    sort_projects(&mut result, filter.sort);
    result
}

/// Stable sort; ties keep the incoming order
pub fn sort_projects(projects: &mut [Project], sort: ProjectSort) {
    match sort {
        ProjectSort::Newest => projects.sort_by(|a, b| b.date.cmp(&a.date)),
        ProjectSort::Oldest => projects.sort_by(|a, b| a.date.cmp(&b.date)),
        ProjectSort::Title => {
            projects.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        }
    }
}

/// Distinct categories in first-seen order, compared case-insensitively
pub fn categories(projects: &[Project]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for project in projects {
        if !seen
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&project.category))
        {
            seen.push(project.category.clone());
        }
    }
    seen
}

/// Distinct technologies across all projects, sorted
pub fn technologies(projects: &[Project]) -> Vec<String> {
    let mut all: Vec<String> = projects
        .iter()
        .flat_map(|p| p.technologies.iter().cloned())
        .collect();
    all.sort_by_key(|t| t.to_lowercase());
    all.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProjectLinks;
    use chrono::{NaiveDate, Utc};
    use proptest::prelude::*;

    fn project(id: i64, title: &str, category: &str, featured: bool, day: u32) -> Project {
        let now = Utc::now();
        Project {
            id,
            title: title.to_string(),
            category: category.to_string(),
            description: format!("{} description", title),
            technologies: vec!["Rust".to_string(), "React".to_string()],
            image: String::new(),
            featured,
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            gallery: vec![],
            tags: vec![],
            links: ProjectLinks::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn sample() -> Vec<Project> {
        vec![
            project(1, "Banking App", "Mobile", true, 10),
            project(2, "agency site", "Web", false, 20),
            project(3, "Crm", "web", true, 5),
        ]
    }

    fn ids(projects: &[Project]) -> Vec<i64> {
        projects.iter().map(|p| p.id).collect()
    }

    #[test]
    fn test_default_filter_sorts_newest_first() {
        let result = filter_projects(&sample(), &ProjectFilter::default());
        assert_eq!(ids(&result), vec![2, 1, 3]);
    }

    #[test]
    fn test_category_is_case_insensitive_and_all_disables() {
        let web = ProjectFilter {
            category: Some("WEB".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_projects(&sample(), &web)), vec![2, 3]);

        let all = ProjectFilter {
            category: Some("All".into()),
            ..Default::default()
        };
        assert_eq!(filter_projects(&sample(), &all).len(), 3);
    }

    #[test]
    fn test_featured_filter() {
        let featured = ProjectFilter {
            featured: Some(true),
            ..Default::default()
        };
        assert_eq!(ids(&filter_projects(&sample(), &featured)), vec![1, 3]);
    }

    #[test]
    fn test_search_and_technology() {
        let search = ProjectFilter {
            search: Some("BANK".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_projects(&sample(), &search)), vec![1]);

        let tech = ProjectFilter {
            technology: Some("react".into()),
            ..Default::default()
        };
        assert_eq!(filter_projects(&sample(), &tech).len(), 3);

        let missing = ProjectFilter {
            technology: Some("Go".into()),
            ..Default::default()
        };
        assert!(filter_projects(&sample(), &missing).is_empty());
    }

    #[test]
    fn test_sort_orders() {
        let oldest = ProjectFilter {
            sort: ProjectSort::Oldest,
            ..Default::default()
        };
        assert_eq!(ids(&filter_projects(&sample(), &oldest)), vec![3, 1, 2]);

        let title = ProjectFilter {
            sort: ProjectSort::Title,
            ..Default::default()
        };
        assert_eq!(ids(&filter_projects(&sample(), &title)), vec![2, 1, 3]);
    }

    #[test]
    fn test_categories_first_seen_order() {
        assert_eq!(categories(&sample()), vec!["Mobile", "Web"]);
        assert!(categories(&[]).is_empty());
    }

    #[test]
    fn test_technologies_deduplicated() {
        assert_eq!(technologies(&sample()), vec!["React", "Rust"]);
    }

    proptest! {
        #[test]
        fn prop_featured_filter_is_exact(flags in proptest::collection::vec(any::<bool>(), 0..40)) {
            let projects: Vec<Project> = flags
                .iter()
                .enumerate()
                .map(|(i, f)| project(i as i64, &format!("P{}", i), "Web", *f, (i % 28) as u32 + 1))
                .collect();
            let filter = ProjectFilter { featured: Some(true), ..Default::default() };
            let result = filter_projects(&projects, &filter);

            let mut got = ids(&result);
            got.sort_unstable();
            let expected: Vec<i64> = projects.iter().filter(|p| p.featured).map(|p| p.id).collect();
            prop_assert_eq!(got, expected);
        }

        #[test]
        fn prop_filter_never_grows(flags in proptest::collection::vec(any::<bool>(), 0..20), needle in "[a-z]{0,3}") {
            let projects: Vec<Project> = flags
                .iter()
                .enumerate()
                .map(|(i, f)| project(i as i64, &format!("p{}x", i), "Web", *f, 1))
                .collect();
            let filter = ProjectFilter { search: Some(needle), ..Default::default() };
            prop_assert!(filter_projects(&projects, &filter).len() <= projects.len());
        }
    }
}
