use crate::domain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// DTO for a project on the API
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug, PartialEq, Eq))]
pub struct Project {
    #[schema(example = 3)]
    pub id: i32,
    #[schema(example = 1)]
    pub owner_user_id: i32,
    #[schema(example = "Groceries")]
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<domain::project::Project> for Project {
    fn from(value: domain::project::Project) -> Self {
        Project {
            id: value.id,
            owner_user_id: value.owner_user_id,
            title: value.title,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// DTO for creating a project via the API
#[derive(Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct NewProject {
    #[schema(example = "Groceries")]
    pub title: String,
}

impl From<NewProject> for domain::project::NewProject {
    fn from(value: NewProject) -> Self {
        domain::project::NewProject { title: value.title }
    }
}

/// DTO for renaming a project via the API
#[derive(Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct UpdateProject {
    #[schema(example = "Weekly groceries")]
    pub title: String,
}

impl From<UpdateProject> for domain::project::UpdateProject {
    fn from(value: UpdateProject) -> Self {
        domain::project::UpdateProject { title: value.title }
    }
}

/// Query parameters selecting a page of projects
#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct ProjectPageQuery {
    /// Page number, starting at 1
    #[param(example = 1)]
    pub page: Option<u32>,
    /// Projects per page, at most 100
    #[param(example = 10)]
    pub per_page: Option<u32>,
}

impl From<ProjectPageQuery> for domain::project::PageRequest {
    fn from(value: ProjectPageQuery) -> Self {
        let defaults = domain::project::PageRequest::default();
        domain::project::PageRequest {
            page: value.page.unwrap_or(defaults.page),
            per_page: value.per_page.unwrap_or(defaults.per_page),
        }
    }
}

/// DTO for a page of projects, newest first
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct ProjectPage {
    pub projects: Vec<Project>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 14)]
    pub total: i64,
    #[schema(example = true)]
    pub has_next: bool,
}

impl From<domain::project::ProjectPage> for ProjectPage {
    fn from(value: domain::project::ProjectPage) -> Self {
        let has_next = value.has_next();
        ProjectPage {
            projects: value.projects.into_iter().map(Project::from).collect(),
            page: value.page,
            per_page: value.per_page,
            total: value.total,
            has_next,
        }
    }
}

/// Query parameters for searching projects by title
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProjectSearchQuery {
    /// Text to look for in project titles, ignoring case
    #[param(example = "groc")]
    pub q: Option<String>,
}

impl From<ProjectSearchQuery> for domain::project::SearchQuery {
    fn from(value: ProjectSearchQuery) -> Self {
        domain::project::SearchQuery {
            query: value.q.unwrap_or_default(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug, PartialEq, Eq))]
pub struct ProjectStats {
    #[schema(example = 4)]
    pub total_projects: i64,
}

impl From<domain::project::ProjectStats> for ProjectStats {
    fn from(value: domain::project::ProjectStats) -> Self {
        ProjectStats {
            total_projects: value.total_projects,
        }
    }
}
