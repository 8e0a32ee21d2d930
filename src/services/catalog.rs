//! Catalog service
//!
//! Projects, service offerings and testimonials: the public listings plus
//! the admin writes behind them. Listings are read through the cache and
//! every write drops the affected key pattern.

use crate::cache::{keys, Cache};
use crate::db::repositories::{ProjectRepository, ServiceRepository, TestimonialRepository};
use crate::models::{
    Project, ProjectFilter, ProjectInput, ProjectLinks, Service, ServiceInput, Testimonial,
    TestimonialInput,
};
use crate::services::portfolio;
use crate::services::validation::{
    validate_project, validate_service, validate_testimonial, ValidationErrors,
};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct CatalogService {
    projects: Arc<dyn ProjectRepository>,
    services: Arc<dyn ServiceRepository>,
    testimonials: Arc<dyn TestimonialRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

/// Trimmed, non-empty entries
fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn clean_optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl CatalogService {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        services: Arc<dyn ServiceRepository>,
        testimonials: Arc<dyn TestimonialRepository>,
        cache: Arc<Cache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            projects,
            services,
            testimonials,
            cache,
            cache_ttl,
        }
    }

    // Projects

    /// Whole portfolio, newest first
    pub async fn all_projects(&self) -> Result<Vec<Project>, CatalogError> {
        if let Some(cached) = self.cache.get_or_miss::<Vec<Project>>(keys::PROJECTS).await {
            return Ok(cached);
        }
        let projects = self.projects.list().await.context("Failed to list projects")?;
        self.cache.put(keys::PROJECTS, &projects, self.cache_ttl).await;
        Ok(projects)
    }

    pub async fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>, CatalogError> {
        let projects = self.all_projects().await?;
        Ok(portfolio::filter_projects(&projects, filter))
    }

    pub async fn project_count(&self) -> Result<i64, CatalogError> {
        Ok(self.projects.count().await.context("Failed to count projects")?)
    }

    pub async fn project_categories(&self) -> Result<Vec<String>, CatalogError> {
        Ok(portfolio::categories(&self.all_projects().await?))
    }

    pub async fn get_project(&self, id: i64) -> Result<Project, CatalogError> {
        self.projects
            .get_by_id(id)
            .await
            .context("Failed to get project")?
            .ok_or(CatalogError::NotFound("Project"))
    }

    pub async fn create_project(&self, input: &ProjectInput) -> Result<Project, CatalogError> {
        let date = validate_project(input)?;
        let now = Utc::now();
        let project = Project {
            id: 0,
            title: input.title.trim().to_string(),
            category: input.category.trim().to_string(),
            description: input.description.trim().to_string(),
            technologies: clean_list(&input.technologies),
            image: input.image.trim().to_string(),
            featured: input.featured,
            date,
            gallery: clean_list(&input.gallery),
            tags: clean_list(&input.tags),
            links: ProjectLinks {
                live: clean_optional(&input.links.live),
                repository: clean_optional(&input.links.repository),
            },
            created_at: now,
            updated_at: now,
        };

        let created = self
            .projects
            .create(&project)
            .await
            .context("Failed to create project")?;
        self.cache.invalidate(keys::PROJECTS_PATTERN).await;
        tracing::info!("Project {} created: {}", created.id, created.title);
        Ok(created)
    }

    pub async fn update_project(&self, id: i64, input: &ProjectInput) -> Result<Project, CatalogError> {
        let existing = self.get_project(id).await?;
        let date = validate_project(input)?;
        let project = Project {
            title: input.title.trim().to_string(),
            category: input.category.trim().to_string(),
            description: input.description.trim().to_string(),
            technologies: clean_list(&input.technologies),
            image: input.image.trim().to_string(),
            featured: input.featured,
            date,
            gallery: clean_list(&input.gallery),
            tags: clean_list(&input.tags),
            links: ProjectLinks {
                live: clean_optional(&input.links.live),
                repository: clean_optional(&input.links.repository),
            },
            updated_at: Utc::now(),
            ..existing
        };

        if !self
            .projects
            .update(&project)
            .await
            .context("Failed to update project")?
        {
            return Err(CatalogError::NotFound("Project"));
        }
        self.cache.invalidate(keys::PROJECTS_PATTERN).await;
        Ok(project)
    }

    pub async fn delete_project(&self, id: i64) -> Result<(), CatalogError> {
        if !self
            .projects
            .delete(id)
            .await
            .context("Failed to delete project")?
        {
            return Err(CatalogError::NotFound("Project"));
        }
        self.cache.invalidate(keys::PROJECTS_PATTERN).await;
        tracing::info!("Project {} deleted", id);
        Ok(())
    }

    // Services

    /// Offerings in display order
    pub async fn list_services(&self) -> Result<Vec<Service>, CatalogError> {
        if let Some(cached) = self.cache.get_or_miss::<Vec<Service>>(keys::SERVICES).await {
            return Ok(cached);
        }
        let services = self.services.list().await.context("Failed to list services")?;
        self.cache.put(keys::SERVICES, &services, self.cache_ttl).await;
        Ok(services)
    }

    pub async fn service_count(&self) -> Result<i64, CatalogError> {
        Ok(self.services.count().await.context("Failed to count services")?)
    }

    pub async fn get_service(&self, id: i64) -> Result<Service, CatalogError> {
        self.services
            .get_by_id(id)
            .await
            .context("Failed to get service")?
            .ok_or(CatalogError::NotFound("Service"))
    }

    pub async fn create_service(&self, input: &ServiceInput) -> Result<Service, CatalogError> {
        validate_service(input)?;
        let now = Utc::now();
        let service = Service {
            id: 0,
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            icon: input.icon.trim().to_string(),
            features: clean_list(&input.features),
            price: clean_optional(&input.price),
            sort_order: input.sort_order,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .services
            .create(&service)
            .await
            .context("Failed to create service")?;
        self.cache.invalidate(keys::SERVICES_PATTERN).await;
        tracing::info!("Service {} created: {}", created.id, created.title);
        Ok(created)
    }

    pub async fn update_service(&self, id: i64, input: &ServiceInput) -> Result<Service, CatalogError> {
        let existing = self.get_service(id).await?;
        validate_service(input)?;
        let service = Service {
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            icon: input.icon.trim().to_string(),
            features: clean_list(&input.features),
            price: clean_optional(&input.price),
            sort_order: input.sort_order,
            updated_at: Utc::now(),
            ..existing
        };

        if !self
            .services
            .update(&service)
            .await
            .context("Failed to update service")?
        {
            return Err(CatalogError::NotFound("Service"));
        }
        self.cache.invalidate(keys::SERVICES_PATTERN).await;
        Ok(service)
    }

    pub async fn delete_service(&self, id: i64) -> Result<(), CatalogError> {
        if !self
            .services
            .delete(id)
            .await
            .context("Failed to delete service")?
        {
            return Err(CatalogError::NotFound("Service"));
        }
        self.cache.invalidate(keys::SERVICES_PATTERN).await;
        Ok(())
    }

    // Testimonials

    pub async fn list_testimonials(&self) -> Result<Vec<Testimonial>, CatalogError> {
        if let Some(cached) = self
            .cache
            .get_or_miss::<Vec<Testimonial>>(keys::TESTIMONIALS)
            .await
        {
            return Ok(cached);
        }
        let testimonials = self
            .testimonials
            .list()
            .await
            .context("Failed to list testimonials")?;
        self.cache
            .put(keys::TESTIMONIALS, &testimonials, self.cache_ttl)
            .await;
        Ok(testimonials)
    }

    pub async fn create_testimonial(&self, input: &TestimonialInput) -> Result<Testimonial, CatalogError> {
        validate_testimonial(input)?;
        let testimonial = Testimonial {
            id: 0,
            author: input.author.trim().to_string(),
            role: input.role.trim().to_string(),
            company: input.company.trim().to_string(),
            quote: input.quote.trim().to_string(),
            avatar: clean_optional(&input.avatar),
            created_at: Utc::now(),
        };

        let created = self
            .testimonials
            .create(&testimonial)
            .await
            .context("Failed to create testimonial")?;
        self.cache.invalidate(keys::TESTIMONIALS_PATTERN).await;
        Ok(created)
    }

    pub async fn delete_testimonial(&self, id: i64) -> Result<(), CatalogError> {
        if !self
            .testimonials
            .delete(id)
            .await
            .context("Failed to delete testimonial")?
        {
            return Err(CatalogError::NotFound("Testimonial"));
        }
        self.cache.invalidate(keys::TESTIMONIALS_PATTERN).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        SqlxProjectRepository, SqlxServiceRepository, SqlxTestimonialRepository,
    };
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> CatalogService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        CatalogService::new(
            SqlxProjectRepository::boxed(pool.clone()),
            SqlxServiceRepository::boxed(pool.clone()),
            SqlxTestimonialRepository::boxed(pool),
            Arc::new(Cache::Memory(MemoryCache::new())),
            Duration::from_secs(60),
        )
    }

    fn project_input(title: &str, featured: bool, date: &str) -> ProjectInput {
        ProjectInput {
            title: title.to_string(),
            category: "Web".to_string(),
            description: "A project".to_string(),
            technologies: vec![" Rust ".to_string(), "".to_string()],
            featured,
            date: date.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_project_cleans_lists() {
        let catalog = setup().await;
        let project = catalog
            .create_project(&project_input("Shop", false, "2024-03-01"))
            .await
            .unwrap();
        assert!(project.id > 0);
        assert_eq!(project.technologies, vec!["Rust"]);
    }

    #[tokio::test]
    async fn test_bad_date_is_field_error() {
        let catalog = setup().await;
        let err = catalog
            .create_project(&project_input("Shop", false, "01/03/2024"))
            .await
            .unwrap_err();
        match err {
            CatalogError::Validation(e) => assert!(e.get("date").is_some()),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_writes_invalidate_cached_listing() {
        let catalog = setup().await;
        catalog
            .create_project(&project_input("First", true, "2024-01-01"))
            .await
            .unwrap();
        assert_eq!(catalog.all_projects().await.unwrap().len(), 1);

        let second = catalog
            .create_project(&project_input("Second", false, "2024-02-01"))
            .await
            .unwrap();
        let all = catalog.all_projects().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);

        let featured = catalog
            .list_projects(&ProjectFilter {
                featured: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(featured.len(), 1);
        assert_eq!(featured[0].title, "First");

        catalog.delete_project(second.id).await.unwrap();
        assert_eq!(catalog.all_projects().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let catalog = setup().await;
        assert!(matches!(
            catalog.update_project(99, &project_input("X", false, "2024-01-01")).await,
            Err(CatalogError::NotFound("Project"))
        ));
        assert!(matches!(
            catalog.delete_service(99).await,
            Err(CatalogError::NotFound("Service"))
        ));
    }

    #[tokio::test]
    async fn test_service_lifecycle() {
        let catalog = setup().await;
        let input = ServiceInput {
            title: "Web development".into(),
            description: "Sites and apps".into(),
            icon: "code".into(),
            features: vec!["SEO".into()],
            price: Some("  ".into()),
            sort_order: 1,
        };
        let service = catalog.create_service(&input).await.unwrap();
        assert_eq!(service.price, None);

        let updated = catalog
            .update_service(
                service.id,
                &ServiceInput {
                    price: Some("From $5k".into()),
                    ..input
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price.as_deref(), Some("From $5k"));
        assert_eq!(catalog.list_services().await.unwrap()[0].price.as_deref(), Some("From $5k"));
    }

    #[tokio::test]
    async fn test_testimonial_requires_quote() {
        let catalog = setup().await;
        let err = catalog
            .create_testimonial(&TestimonialInput {
                author: "Ana".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }
}
