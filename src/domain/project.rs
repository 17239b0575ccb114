use crate::domain;
use crate::domain::project::driven_ports::{DetectProject, ProjectReader, ProjectWriter};
use crate::domain::project::driving_ports::ProjectError;
use crate::domain::reject_forbidden_chars;
use crate::external_connections::{ExternalConnectivity, Transactable, TransactionHandle};
use anyhow::Context;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};
use validator::Validate;

pub const PROJECT_TITLE_MAX_LENGTH: usize = 64;
pub const DEFAULT_PROJECTS_PER_PAGE: u32 = 10;
/// Upper bound on "(Copy N)" suffixes tried before giving up on a duplicate
const MAX_COPY_ATTEMPTS: u32 = 1000;

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Project {
    pub id: i32,
    pub owner_user_id: i32,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Validate)]
pub struct NewProject {
    #[validate(length(min = 3, max = 64), custom = "reject_forbidden_chars")]
    pub title: String,
}

#[derive(Debug, Clone, Validate)]
pub struct UpdateProject {
    #[validate(length(min = 3, max = 64), custom = "reject_forbidden_chars")]
    pub title: String,
}

/// Which slice of a user's projects to list. Pages start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Validate)]
pub struct PageRequest {
    #[validate(range(min = 1))]
    pub page: u32,
    #[validate(range(min = 1, max = 100))]
    pub per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: 1,
            per_page: DEFAULT_PROJECTS_PER_PAGE,
        }
    }
}

impl PageRequest {
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPage {
    pub projects: Vec<Project>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl ProjectPage {
    pub fn has_next(&self) -> bool {
        i64::from(self.page) * i64::from(self.per_page) < self.total
    }
}

#[derive(Debug, Clone, Validate)]
pub struct SearchQuery {
    #[validate(length(max = 50))]
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectStats {
    pub total_projects: i64,
}

pub mod driven_ports {
    use super::*;

    pub trait ProjectReader: Sync {
        /// Newest projects first
        async fn projects_for_user(
            &self,
            user_id: i32,
            page: &PageRequest,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Vec<Project>, anyhow::Error>;
        async fn count_for_user(
            &self,
            user_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<i64, anyhow::Error>;
        async fn project_by_id(
            &self,
            project_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<Project>, anyhow::Error>;
        /// Case-insensitive substring match on the title
        async fn search_for_user(
            &self,
            user_id: i32,
            query: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Vec<Project>, anyhow::Error>;
    }

    pub trait DetectProject: Sync {
        async fn project_with_title_exists(
            &self,
            user_id: i32,
            title: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;
    }

    pub trait ProjectWriter: Sync {
        /// Returns None if the owner already has a project with this title
        async fn create_project(
            &self,
            user_id: i32,
            title: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<Project>, anyhow::Error>;
        /// Returns None if the owner already has another project with this title
        async fn update_title(
            &self,
            project_id: i32,
            title: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<Project>, anyhow::Error>;
        async fn delete_project(
            &self,
            project_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
        /// Copies every task of one project into another, returning how many were copied
        async fn copy_tasks(
            &self,
            from_project_id: i32,
            to_project_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<u64, anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;
    use crate::domain::user::driven_ports::DetectUser;
    use validator::ValidationErrors;

    #[derive(Debug, Error)]
    pub enum ProjectError {
        #[error("project input was invalid: {0}")]
        Invalid(#[from] ValidationErrors),
        #[error("Project with title '{0}' already exists for this user.")]
        AlreadyExists(String),
        #[error("Project not found.")]
        DoesNotExist,
        #[error("You don't have permission to perform this action on this project.")]
        NoPermission,
        #[error("The specified user did not exist.")]
        UserDoesNotExist,
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    impl From<domain::user::UserExistsErr> for ProjectError {
        fn from(value: domain::user::UserExistsErr) -> Self {
            match value {
                domain::user::UserExistsErr::UserDoesNotExist(user_id) => {
                    warn!("User {user_id} didn't exist when creating a project.");
                    ProjectError::UserDoesNotExist
                }
                domain::user::UserExistsErr::PortError(err) => {
                    ProjectError::from(err.context("Verifying project owner exists"))
                }
            }
        }
    }

    impl From<ProjectAccessErr> for ProjectError {
        fn from(value: ProjectAccessErr) -> Self {
            match value {
                ProjectAccessErr::NotFound => ProjectError::DoesNotExist,
                ProjectAccessErr::NotOwner => ProjectError::NoPermission,
                ProjectAccessErr::PortError(err) => ProjectError::PortError(err),
            }
        }
    }


    pub trait ProjectPort {
        async fn user_projects(
            &self,
            user_id: i32,
            page: &PageRequest,
            ext_cxn: &mut impl ExternalConnectivity,
            p_read: &impl ProjectReader,
        ) -> Result<ProjectPage, ProjectError>;
        async fn project_for_user(
            &self,
            user_id: i32,
            project_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
            p_read: &impl ProjectReader,
        ) -> Result<Project, ProjectError>;
        async fn create_project(
            &self,
            user_id: i32,
            project: &NewProject,
            ext_cxn: &mut impl ExternalConnectivity,
            u_detect: &impl DetectUser,
            p_detect: &impl DetectProject,
            p_write: &impl ProjectWriter,
        ) -> Result<Project, ProjectError>;
        async fn update_project(
            &self,
            user_id: i32,
            project_id: i32,
            update: &UpdateProject,
            ext_cxn: &mut impl ExternalConnectivity,
            p_read: &impl ProjectReader,
            p_detect: &impl DetectProject,
            p_write: &impl ProjectWriter,
        ) -> Result<Project, ProjectError>;
        async fn delete_project(
            &self,
            user_id: i32,
            project_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
            p_read: &impl ProjectReader,
            p_write: &impl ProjectWriter,
        ) -> Result<(), ProjectError>;
        async fn duplicate_project(
            &self,
            user_id: i32,
            project_id: i32,
            ext_cxn: &mut impl Transactable,
            p_read: &impl ProjectReader,
            p_detect: &impl DetectProject,
            p_write: &impl ProjectWriter,
        ) -> Result<Project, ProjectError>;
        async fn search_projects(
            &self,
            user_id: i32,
            query: &SearchQuery,
            ext_cxn: &mut impl ExternalConnectivity,
            p_read: &impl ProjectReader,
        ) -> Result<Vec<Project>, ProjectError>;
        async fn project_stats(
            &self,
            user_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
            p_read: &impl ProjectReader,
        ) -> Result<ProjectStats, ProjectError>;
    }
}

#[derive(Debug, Error)]
pub(super) enum ProjectAccessErr {
    #[error("project does not exist")]
    NotFound,
    #[error("project belongs to another user")]
    NotOwner,
    #[error(transparent)]
    PortError(#[from] anyhow::Error),
}

/// Fetches a project and confirms the given user owns it
pub(super) async fn verify_project_owner(
    user_id: i32,
    project_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    p_read: &impl ProjectReader,
) -> Result<Project, ProjectAccessErr> {
    let project = p_read
        .project_by_id(project_id, ext_cxn)
        .await
        .context("looking up a project to check its owner")?
        .ok_or(ProjectAccessErr::NotFound)?;

    if project.owner_user_id != user_id {
        warn!("User {user_id} tried to access project {project_id} owned by someone else");
        return Err(ProjectAccessErr::NotOwner);
    }

    Ok(project)
}

/// Builds the title for the `attempt`th copy of a project, shortening the original
/// title so the result still fits the title length limit
fn copy_title(original: &str, attempt: u32) -> String {
    let suffix = if attempt == 0 {
        " (Copy)".to_owned()
    } else {
        format!(" (Copy {attempt})")
    };
    let room = PROJECT_TITLE_MAX_LENGTH.saturating_sub(suffix.chars().count());
    let base: String = original.chars().take(room).collect();

    format!("{}{suffix}", base.trim_end())
}

pub struct ProjectService {}

impl driving_ports::ProjectPort for ProjectService {
    async fn user_projects(
        &self,
        user_id: i32,
        page: &PageRequest,
        ext_cxn: &mut impl ExternalConnectivity,
        p_read: &impl ProjectReader,
    ) -> Result<ProjectPage, ProjectError> {
        page.validate()?;

        let total = p_read
            .count_for_user(user_id, &mut *ext_cxn)
            .await
            .context("counting a user's projects")?;
        let projects = p_read
            .projects_for_user(user_id, page, &mut *ext_cxn)
            .await
            .context("listing a user's projects")?;

        Ok(ProjectPage {
            projects,
            page: page.page,
            per_page: page.per_page,
            total,
        })
    }

    async fn project_for_user(
        &self,
        user_id: i32,
        project_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
        p_read: &impl ProjectReader,
    ) -> Result<Project, ProjectError> {
        Ok(verify_project_owner(user_id, project_id, ext_cxn, p_read).await?)
    }

    async fn create_project(
        &self,
        user_id: i32,
        project: &NewProject,
        ext_cxn: &mut impl ExternalConnectivity,
        u_detect: &impl domain::user::driven_ports::DetectUser,
        p_detect: &impl DetectProject,
        p_write: &impl ProjectWriter,
    ) -> Result<Project, ProjectError> {
        let project = NewProject {
            title: project.title.trim().to_owned(),
        };
        project.validate()?;

        domain::user::verify_user_exists(user_id, &mut *ext_cxn, u_detect).await?;

        let title_taken = p_detect
            .project_with_title_exists(user_id, &project.title, &mut *ext_cxn)
            .await
            .context("checking for a duplicate project title")?;
        if title_taken {
            return Err(ProjectError::AlreadyExists(project.title));
        }

        let created = p_write
            .create_project(user_id, &project.title, &mut *ext_cxn)
            .await
            .context("creating a project")?
            .ok_or_else(|| ProjectError::AlreadyExists(project.title.clone()))?;

        info!("Project '{}' created by user {user_id}", created.title);
        Ok(created)
    }

    async fn update_project(
        &self,
        user_id: i32,
        project_id: i32,
        update: &UpdateProject,
        ext_cxn: &mut impl ExternalConnectivity,
        p_read: &impl ProjectReader,
        p_detect: &impl DetectProject,
        p_write: &impl ProjectWriter,
    ) -> Result<Project, ProjectError> {
        let existing = verify_project_owner(user_id, project_id, &mut *ext_cxn, p_read).await?;

        let update = UpdateProject {
            title: update.title.trim().to_owned(),
        };
        update.validate()?;

        if existing.title != update.title {
            let title_taken = p_detect
                .project_with_title_exists(user_id, &update.title, &mut *ext_cxn)
                .await
                .context("checking for a duplicate project title")?;
            if title_taken {
                return Err(ProjectError::AlreadyExists(update.title));
            }
        }

        let updated = p_write
            .update_title(project_id, &update.title, &mut *ext_cxn)
            .await
            .context("renaming a project")?
            .ok_or_else(|| ProjectError::AlreadyExists(update.title.clone()))?;

        info!(
            "Project '{}' updated to '{}' by user {user_id}",
            existing.title, updated.title
        );
        Ok(updated)
    }

    async fn delete_project(
        &self,
        user_id: i32,
        project_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
        p_read: &impl ProjectReader,
        p_write: &impl ProjectWriter,
    ) -> Result<(), ProjectError> {
        let existing = verify_project_owner(user_id, project_id, &mut *ext_cxn, p_read).await?;

        p_write
            .delete_project(project_id, &mut *ext_cxn)
            .await
            .context("deleting a project")?;

        info!("Project '{}' deleted by user {user_id}", existing.title);
        Ok(())
    }

    async fn duplicate_project(
        &self,
        user_id: i32,
        project_id: i32,
        ext_cxn: &mut impl Transactable,
        p_read: &impl ProjectReader,
        p_detect: &impl DetectProject,
        p_write: &impl ProjectWriter,
    ) -> Result<Project, ProjectError> {
        let original = verify_project_owner(user_id, project_id, &mut *ext_cxn, p_read).await?;
        let mut txn = ext_cxn
            .start_transaction()
            .await
            .context("starting project duplication")?;

        let mut free_title = None;
        for attempt in 0..MAX_COPY_ATTEMPTS {
            let candidate = copy_title(&original.title, attempt);
            let taken = p_detect
                .project_with_title_exists(user_id, &candidate, &mut txn)
                .await
                .context("checking for a free copy title")?;
            if !taken {
                free_title = Some(candidate);
                break;
            }
        }
        let Some(title) = free_title else {
            return Err(ProjectError::AlreadyExists(copy_title(
                &original.title,
                MAX_COPY_ATTEMPTS,
            )));
        };

        let copy = p_write
            .create_project(user_id, &title, &mut txn)
            .await
            .context("creating the copied project")?
            .ok_or_else(|| ProjectError::AlreadyExists(title.clone()))?;
        let copied_tasks = p_write
            .copy_tasks(original.id, copy.id, &mut txn)
            .await
            .context("copying tasks into the duplicated project")?;
        txn.commit()
            .await
            .context("committing project duplication")?;

        info!(
            "Project '{}' duplicated to '{}' with {copied_tasks} tasks by user {user_id}",
            original.title, copy.title
        );
        Ok(copy)
    }

    async fn search_projects(
        &self,
        user_id: i32,
        query: &SearchQuery,
        ext_cxn: &mut impl ExternalConnectivity,
        p_read: &impl ProjectReader,
    ) -> Result<Vec<Project>, ProjectError> {
        let query = SearchQuery {
            query: query.query.trim().to_owned(),
        };
        if query.query.is_empty() {
            return Ok(Vec::new());
        }
        query.validate()?;

        Ok(p_read
            .search_for_user(user_id, &query.query, ext_cxn)
            .await
            .context("searching a user's projects")?)
    }

    async fn project_stats(
        &self,
        user_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
        p_read: &impl ProjectReader,
    ) -> Result<ProjectStats, ProjectError> {
        let total_projects = p_read
            .count_for_user(user_id, ext_cxn)
            .await
            .context("counting projects for stats")?;

        Ok(ProjectStats { total_projects })
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use crate::domain::project::driving_ports::ProjectPort;
    use crate::domain::test_util::Connectivity;
    use crate::domain::user::test_util::{InMemoryUserPersistence, user_create_default};
    use crate::external_connections::test_util::FakeExternalConnectivity;
    use speculoos::prelude::*;
    use std::sync::RwLock;

    fn one_user() -> RwLock<InMemoryUserPersistence> {
        RwLock::new(InMemoryUserPersistence::new_with_users(&[user_create_default()]))
    }

    mod copy_title {
        use super::*;

        #[test]
        fn first_copy_has_plain_suffix() {
            assert_eq!("Groceries (Copy)", copy_title("Groceries", 0));
        }

        #[test]
        fn later_copies_are_numbered() {
            assert_eq!("Groceries (Copy 3)", copy_title("Groceries", 3));
        }

        #[test]
        fn long_titles_are_shortened_to_fit() {
            let long_title: String = "x".repeat(64);
            let copied = copy_title(&long_title, 12);

            assert_eq!(64, copied.chars().count());
            assert!(copied.ends_with(" (Copy 12)"));
        }
    }

    mod user_projects {
        use super::*;

        #[tokio::test]
        async fn returns_requested_page_newest_first() {
            let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[
                (1, "First"),
                (1, "Second"),
                (2, "Someone else's"),
                (1, "Third"),
            ]));
            let mut ext_cxn = FakeExternalConnectivity::new();

            let page_result = ProjectService {}
                .user_projects(
                    1,
                    &PageRequest {
                        page: 1,
                        per_page: 2,
                    },
                    &mut ext_cxn,
                    &projects,
                )
                .await;
            assert_that!(page_result).is_ok().matches(|page| {
                matches!(page.projects.as_slice(), [
                    Project { title: t1, .. },
                    Project { title: t2, .. },
                ] if t1 == "Third" && t2 == "Second")
                    && page.total == 3
                    && page.has_next()
            });
        }

        #[tokio::test]
        async fn page_past_the_end_is_empty() {
            let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[(
                1, "Only",
            )]));
            let mut ext_cxn = FakeExternalConnectivity::new();

            let page_result = ProjectService {}
                .user_projects(
                    1,
                    &PageRequest {
                        page: 5,
                        per_page: 10,
                    },
                    &mut ext_cxn,
                    &projects,
                )
                .await;
            assert_that!(page_result)
                .is_ok()
                .matches(|page| page.projects.is_empty() && page.total == 1 && !page.has_next());
        }

        #[tokio::test]
        async fn rejects_oversized_pages() {
            let projects = InMemoryProjectPersistence::new_locked();
            let mut ext_cxn = FakeExternalConnectivity::new();

            let page_result = ProjectService {}
                .user_projects(
                    1,
                    &PageRequest {
                        page: 1,
                        per_page: 101,
                    },
                    &mut ext_cxn,
                    &projects,
                )
                .await;
            assert_that!(page_result)
                .is_err()
                .matches(|err| matches!(err, ProjectError::Invalid(_)));
        }
    }

    mod project_for_user {
        use super::*;

        #[tokio::test]
        async fn rejects_other_owners() {
            let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[(
                2, "Private",
            )]));
            let mut ext_cxn = FakeExternalConnectivity::new();

            let fetch_result = ProjectService {}
                .project_for_user(1, 1, &mut ext_cxn, &projects)
                .await;
            assert_that!(fetch_result)
                .is_err()
                .matches(|err| matches!(err, ProjectError::NoPermission));
        }

        #[tokio::test]
        async fn reports_missing_projects() {
            let projects = InMemoryProjectPersistence::new_locked();
            let mut ext_cxn = FakeExternalConnectivity::new();

            let fetch_result = ProjectService {}
                .project_for_user(1, 10, &mut ext_cxn, &projects)
                .await;
            assert_that!(fetch_result)
                .is_err()
                .matches(|err| matches!(err, ProjectError::DoesNotExist));
        }
    }

    mod create_project {
        use super::*;

        #[tokio::test]
        async fn happy_path_trims_title() {
            let users = one_user();
            let projects = InMemoryProjectPersistence::new_locked();
            let mut ext_cxn = FakeExternalConnectivity::new();

            let create_result = ProjectService {}
                .create_project(
                    1,
                    &NewProject {
                        title: "  Home renovation ".to_owned(),
                    },
                    &mut ext_cxn,
                    &users,
                    &projects,
                    &projects,
                )
                .await;
            assert_that!(create_result)
                .is_ok()
                .matches(|project| project.title == "Home renovation" && project.owner_user_id == 1);
        }

        #[tokio::test]
        async fn rejects_short_titles() {
            let users = one_user();
            let projects = InMemoryProjectPersistence::new_locked();
            let mut ext_cxn = FakeExternalConnectivity::new();

            let create_result = ProjectService {}
                .create_project(
                    1,
                    &NewProject {
                        title: " ab  ".to_owned(),
                    },
                    &mut ext_cxn,
                    &users,
                    &projects,
                    &projects,
                )
                .await;
            let Err(ProjectError::Invalid(errors)) = create_result else {
                panic!("Expected a validation error, got {create_result:#?}");
            };
            assert!(errors.field_errors().contains_key("title"));
        }

        #[tokio::test]
        async fn rejects_markup_in_titles() {
            let users = one_user();
            let projects = InMemoryProjectPersistence::new_locked();
            let mut ext_cxn = FakeExternalConnectivity::new();

            let create_result = ProjectService {}
                .create_project(
                    1,
                    &NewProject {
                        title: "<script>".to_owned(),
                    },
                    &mut ext_cxn,
                    &users,
                    &projects,
                    &projects,
                )
                .await;
            assert_that!(create_result)
                .is_err()
                .matches(|err| matches!(err, ProjectError::Invalid(_)));
        }

        #[tokio::test]
        async fn rejects_duplicate_title_for_same_owner() {
            let users = one_user();
            let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[(
                1, "Garden",
            )]));
            let mut ext_cxn = FakeExternalConnectivity::new();

            let create_result = ProjectService {}
                .create_project(
                    1,
                    &NewProject {
                        title: "Garden".to_owned(),
                    },
                    &mut ext_cxn,
                    &users,
                    &projects,
                    &projects,
                )
                .await;
            assert_that!(create_result)
                .is_err()
                .matches(|err| matches!(err, ProjectError::AlreadyExists(title) if title == "Garden"));
        }

        #[tokio::test]
        async fn same_title_is_fine_for_another_owner() {
            let users = RwLock::new(InMemoryUserPersistence::new_with_users(&[
                user_create_default(),
                crate::domain::user::CreateUser {
                    email: "other@example.com".to_owned(),
                    display_name: "Other".to_owned(),
                },
            ]));
            let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[(
                1, "Garden",
            )]));
            let mut ext_cxn = FakeExternalConnectivity::new();

            let create_result = ProjectService {}
                .create_project(
                    2,
                    &NewProject {
                        title: "Garden".to_owned(),
                    },
                    &mut ext_cxn,
                    &users,
                    &projects,
                    &projects,
                )
                .await;
            assert_that!(create_result)
                .is_ok()
                .matches(|project| project.owner_user_id == 2);
        }

        #[tokio::test]
        async fn requires_existing_user() {
            let users = InMemoryUserPersistence::new_locked();
            let projects = InMemoryProjectPersistence::new_locked();
            let mut ext_cxn = FakeExternalConnectivity::new();

            let create_result = ProjectService {}
                .create_project(
                    7,
                    &NewProject {
                        title: "Orphan".to_owned(),
                    },
                    &mut ext_cxn,
                    &users,
                    &projects,
                    &projects,
                )
                .await;
            assert_that!(create_result)
                .is_err()
                .matches(|err| matches!(err, ProjectError::UserDoesNotExist));
        }

        #[tokio::test]
        async fn propagates_port_error() {
            let users = one_user();
            let mut raw_projects = InMemoryProjectPersistence::new();
            raw_projects.connectivity = Connectivity::Disconnected;
            let projects = RwLock::new(raw_projects);
            let mut ext_cxn = FakeExternalConnectivity::new();

            let create_result = ProjectService {}
                .create_project(
                    1,
                    &NewProject {
                        title: "Offline".to_owned(),
                    },
                    &mut ext_cxn,
                    &users,
                    &projects,
                    &projects,
                )
                .await;
            assert_that!(create_result)
                .is_err()
                .matches(|err| matches!(err, ProjectError::PortError(_)));
        }
    }

    mod update_project {
        use super::*;

        #[tokio::test]
        async fn happy_path() {
            let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[(
                1, "Old name",
            )]));
            let mut ext_cxn = FakeExternalConnectivity::new();

            let update_result = ProjectService {}
                .update_project(
                    1,
                    1,
                    &UpdateProject {
                        title: "New name".to_owned(),
                    },
                    &mut ext_cxn,
                    &projects,
                    &projects,
                    &projects,
                )
                .await;
            assert_that!(update_result)
                .is_ok()
                .matches(|project| project.title == "New name");
        }

        #[tokio::test]
        async fn keeping_the_same_title_is_allowed() {
            let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[(
                1, "Stable",
            )]));
            let mut ext_cxn = FakeExternalConnectivity::new();

            let update_result = ProjectService {}
                .update_project(
                    1,
                    1,
                    &UpdateProject {
                        title: "Stable ".to_owned(),
                    },
                    &mut ext_cxn,
                    &projects,
                    &projects,
                    &projects,
                )
                .await;
            assert_that!(update_result).is_ok();
        }

        #[tokio::test]
        async fn rejects_title_of_another_project() {
            let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[
                (1, "Taken"),
                (1, "Mine"),
            ]));
            let mut ext_cxn = FakeExternalConnectivity::new();

            let update_result = ProjectService {}
                .update_project(
                    1,
                    2,
                    &UpdateProject {
                        title: "Taken".to_owned(),
                    },
                    &mut ext_cxn,
                    &projects,
                    &projects,
                    &projects,
                )
                .await;
            assert_that!(update_result)
                .is_err()
                .matches(|err| matches!(err, ProjectError::AlreadyExists(_)));
        }

        #[tokio::test]
        async fn rejects_other_owners_before_validating() {
            let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[(
                2, "Theirs",
            )]));
            let mut ext_cxn = FakeExternalConnectivity::new();

            let update_result = ProjectService {}
                .update_project(
                    1,
                    1,
                    &UpdateProject {
                        title: String::new(),
                    },
                    &mut ext_cxn,
                    &projects,
                    &projects,
                    &projects,
                )
                .await;
            assert_that!(update_result)
                .is_err()
                .matches(|err| matches!(err, ProjectError::NoPermission));

            let locked_projects = projects.read().expect("project rwlock poisoned");
            assert_eq!("Theirs", locked_projects.projects[0].title);
        }
    }

    mod delete_project {
        use super::*;

        #[tokio::test]
        async fn happy_path() {
            let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[
                (1, "Keep"),
                (1, "Drop"),
            ]));
            let mut ext_cxn = FakeExternalConnectivity::new();

            let delete_result = ProjectService {}
                .delete_project(1, 2, &mut ext_cxn, &projects, &projects)
                .await;
            assert_that!(delete_result).is_ok();

            let locked_projects = projects.read().expect("project rwlock poisoned");
            assert!(matches!(locked_projects.projects.as_slice(), [
                Project { title, .. }
            ] if title == "Keep"));
        }

        #[tokio::test]
        async fn cannot_delete_other_owners_project() {
            let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[(
                2, "Theirs",
            )]));
            let mut ext_cxn = FakeExternalConnectivity::new();

            let delete_result = ProjectService {}
                .delete_project(1, 1, &mut ext_cxn, &projects, &projects)
                .await;
            assert_that!(delete_result)
                .is_err()
                .matches(|err| matches!(err, ProjectError::NoPermission));
            assert_eq!(1, projects.read().expect("project rwlock poisoned").projects.len());
        }
    }

    mod duplicate_project {
        use super::*;

        #[tokio::test]
        async fn copies_project_and_tasks_in_a_transaction() {
            let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[(
                1, "Launch",
            )]));
            let mut ext_cxn = FakeExternalConnectivity::new();

            let duplicate_result = ProjectService {}
                .duplicate_project(1, 1, &mut ext_cxn, &projects, &projects, &projects)
                .await;
            assert_that!(duplicate_result)
                .is_ok()
                .matches(|project| project.title == "Launch (Copy)" && project.id == 2);

            assert_eq!(1, ext_cxn.transactions_started());
            assert_eq!(1, ext_cxn.transactions_committed());
            let locked_projects = projects.read().expect("project rwlock poisoned");
            assert_eq!(vec![(1, 2)], locked_projects.copied_tasks);
        }

        #[tokio::test]
        async fn picks_next_free_copy_number() {
            let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[
                (1, "Launch"),
                (1, "Launch (Copy)"),
                (1, "Launch (Copy 1)"),
            ]));
            let mut ext_cxn = FakeExternalConnectivity::new();

            let duplicate_result = ProjectService {}
                .duplicate_project(1, 1, &mut ext_cxn, &projects, &projects, &projects)
                .await;
            assert_that!(duplicate_result)
                .is_ok()
                .matches(|project| project.title == "Launch (Copy 2)");
        }

        #[tokio::test]
        async fn does_not_commit_on_failure() {
            let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[(
                2, "Theirs",
            )]));
            let mut ext_cxn = FakeExternalConnectivity::new();

            let duplicate_result = ProjectService {}
                .duplicate_project(1, 1, &mut ext_cxn, &projects, &projects, &projects)
                .await;
            assert_that!(duplicate_result)
                .is_err()
                .matches(|err| matches!(err, ProjectError::NoPermission));
            assert_eq!(0, ext_cxn.transactions_committed());
        }
    }

    mod search_projects {
        use super::*;

        #[tokio::test]
        async fn matches_case_insensitively_within_owner() {
            let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[
                (1, "Kitchen remodel"),
                (1, "Garden"),
                (2, "Kitchen for someone else"),
            ]));
            let mut ext_cxn = FakeExternalConnectivity::new();

            let search_result = ProjectService {}
                .search_projects(
                    1,
                    &SearchQuery {
                        query: " KITCHEN ".to_owned(),
                    },
                    &mut ext_cxn,
                    &projects,
                )
                .await;
            assert_that!(search_result).is_ok().matches(|found| {
                matches!(found.as_slice(), [Project { title, .. }] if title == "Kitchen remodel")
            });
        }

        #[tokio::test]
        async fn blank_query_finds_nothing() {
            let mut raw_projects = InMemoryProjectPersistence::new();
            raw_projects.connectivity = Connectivity::Disconnected;
            let projects = RwLock::new(raw_projects);
            let mut ext_cxn = FakeExternalConnectivity::new();

            let search_result = ProjectService {}
                .search_projects(
                    1,
                    &SearchQuery {
                        query: "   ".to_owned(),
                    },
                    &mut ext_cxn,
                    &projects,
                )
                .await;
            assert_that!(search_result)
                .is_ok()
                .matches(|found| found.is_empty());
        }

        #[tokio::test]
        async fn rejects_overlong_query() {
            let projects = InMemoryProjectPersistence::new_locked();
            let mut ext_cxn = FakeExternalConnectivity::new();

            let search_result = ProjectService {}
                .search_projects(
                    1,
                    &SearchQuery {
                        query: "q".repeat(51),
                    },
                    &mut ext_cxn,
                    &projects,
                )
                .await;
            assert_that!(search_result)
                .is_err()
                .matches(|err| matches!(err, ProjectError::Invalid(_)));
        }
    }

    #[tokio::test]
    async fn project_stats_counts_owned_projects() {
        let projects = RwLock::new(InMemoryProjectPersistence::new_with_projects(&[
            (1, "One"),
            (1, "Two"),
            (3, "Three"),
        ]));
        let mut ext_cxn = FakeExternalConnectivity::new();

        let stats_result = ProjectService {}
            .project_stats(1, &mut ext_cxn, &projects)
            .await;
        assert_that!(stats_result).is_ok_containing(ProjectStats { total_projects: 2 });
    }
}
