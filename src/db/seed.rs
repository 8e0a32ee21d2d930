//! Demo content
//!
//! Fills an empty database with a small portfolio, the service catalogue,
//! a few testimonials and a welcome post so a fresh install has something
//! to show. Nothing is written once any project or service exists.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};

use crate::db::repositories::{
    PostRepository, ProjectRepository, ServiceRepository, SqlxPostRepository,
    SqlxProjectRepository, SqlxServiceRepository, SqlxTestimonialRepository,
    TestimonialRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{Post, Project, ProjectLinks, Service, Testimonial};
use crate::services::markdown::MarkdownRenderer;

struct DemoProject {
    title: &'static str,
    category: &'static str,
    description: &'static str,
    technologies: &'static [&'static str],
    featured: bool,
    date: (i32, u32, u32),
}

const PROJECTS: &[DemoProject] = &[
    DemoProject {
        title: "Harbor Banking App",
        category: "Mobile",
        description: "A mobile banking experience with instant transfers and spending insights.",
        technologies: &["React Native", "TypeScript", "Rust"],
        featured: true,
        date: (2024, 5, 14),
    },
    DemoProject {
        title: "Northwind Commerce",
        category: "Web",
        description: "Headless storefront serving two million monthly visitors.",
        technologies: &["Next.js", "PostgreSQL", "Redis"],
        featured: true,
        date: (2024, 2, 2),
    },
    DemoProject {
        title: "Atlas Field Ops",
        category: "Enterprise",
        description: "Offline-first scheduling and dispatch for field technicians.",
        technologies: &["Rust", "SQLite", "Flutter"],
        featured: false,
        date: (2023, 10, 21),
    },
    DemoProject {
        title: "Lumen Analytics",
        category: "Web",
        description: "Real-time product analytics dashboards with custom query builder.",
        technologies: &["Svelte", "ClickHouse", "Go"],
        featured: false,
        date: (2023, 6, 9),
    },
];

const SERVICES: &[(&str, &str, &str, &[&str], Option<&str>)] = &[
    (
        "Web Development",
        "Fast, accessible websites and web applications built to grow with you.",
        "code",
        &["Responsive design", "Performance budgets", "CMS integration"],
        Some("From $8,000"),
    ),
    (
        "Mobile Apps",
        "Native-quality iOS and Android apps from a single codebase.",
        "smartphone",
        &["Cross-platform", "Offline support", "App store launch"],
        Some("From $15,000"),
    ),
    (
        "Cloud & DevOps",
        "Infrastructure that deploys on every merge and scales on demand.",
        "cloud",
        &["CI/CD pipelines", "Observability", "Cost reviews"],
        None,
    ),
    (
        "Product Design",
        "Research, prototyping and design systems that keep teams consistent.",
        "pen-tool",
        &["User research", "Prototyping", "Design systems"],
        None,
    ),
];

const TESTIMONIALS: &[(&str, &str, &str, &str)] = &[
    (
        "Maya Chen",
        "CTO",
        "Harbor Financial",
        "They shipped our app two weeks early and the crash rate has been near zero since launch.",
    ),
    (
        "Daniel Okafor",
        "Head of Digital",
        "Northwind",
        "The new storefront halved our page load times. Conversion followed.",
    ),
    (
        "Sofia Marquez",
        "Operations Director",
        "Atlas Utilities",
        "Our technicians finally trust the schedule on their phones, even without signal.",
    ),
];

const WELCOME_POST: &str = "\
We're a small team of engineers and designers who build web and mobile products.

## What we do

- Web applications and marketing sites
- Mobile apps for iOS and Android
- Cloud infrastructure and DevOps

Have a project in mind? [Get in touch](/contact).
";

/// Seed demo content when the catalogue is empty. Returns whether anything
/// was written.
pub async fn seed_demo_content(pool: &DynDatabasePool) -> Result<bool> {
    let projects = SqlxProjectRepository::new(pool.clone());
    let services = SqlxServiceRepository::new(pool.clone());
    let testimonials = SqlxTestimonialRepository::new(pool.clone());
    let posts = SqlxPostRepository::new(pool.clone());

    if projects.count().await? > 0 || services.count().await? > 0 {
        return Ok(false);
    }

    let now = Utc::now();

    for demo in PROJECTS {
        let (y, m, d) = demo.date;
        let date = NaiveDate::from_ymd_opt(y, m, d)
            .with_context(|| format!("Invalid demo date for {}", demo.title))?;
        projects
            .create(&Project {
                id: 0,
                title: demo.title.to_string(),
                category: demo.category.to_string(),
                description: demo.description.to_string(),
                technologies: demo.technologies.iter().map(|t| t.to_string()).collect(),
                image: String::new(),
                featured: demo.featured,
                date,
                gallery: Vec::new(),
                tags: Vec::new(),
                links: ProjectLinks::default(),
                created_at: now,
                updated_at: now,
            })
            .await?;
    }

    for (order, (title, description, icon, features, price)) in SERVICES.iter().enumerate() {
        services
            .create(&Service {
                id: 0,
                title: title.to_string(),
                description: description.to_string(),
                icon: icon.to_string(),
                features: features.iter().map(|f| f.to_string()).collect(),
                price: price.map(str::to_string),
                sort_order: order as i32,
                created_at: now,
                updated_at: now,
            })
            .await?;
    }

    for (author, role, company, quote) in TESTIMONIALS {
        testimonials
            .create(&Testimonial {
                id: 0,
                author: author.to_string(),
                role: role.to_string(),
                company: company.to_string(),
                quote: quote.to_string(),
                avatar: None,
                created_at: now,
            })
            .await?;
    }

    let renderer = MarkdownRenderer::new();
    posts
        .create(&Post {
            id: 0,
            slug: "hello-from-the-studio".to_string(),
            title: "Hello from the studio".to_string(),
            excerpt: renderer.excerpt(WELCOME_POST, 200),
            content: WELCOME_POST.to_string(),
            content_html: renderer.render(WELCOME_POST),
            author: "The Team".to_string(),
            tags: vec!["news".to_string()],
            published: true,
            published_at: Some(now),
            created_at: now,
            updated_at: now,
        })
        .await?;

    tracing::info!(
        "Seeded demo content: {} projects, {} services, {} testimonials",
        PROJECTS.len(),
        SERVICES.len(),
        TESTIMONIALS.len()
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    #[tokio::test]
    async fn test_seed_runs_once() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        assert!(seed_demo_content(&pool).await.unwrap());
        assert!(!seed_demo_content(&pool).await.unwrap());

        let projects = SqlxProjectRepository::new(pool.clone());
        assert_eq!(projects.count().await.unwrap(), PROJECTS.len() as i64);
        let posts = SqlxPostRepository::new(pool);
        assert_eq!(posts.list(true).await.unwrap().len(), 1);
    }
}
