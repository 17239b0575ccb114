use super::{Count, is_unique_violation};
use crate::domain;
use crate::domain::project::{PageRequest, Project};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error, anyhow};
use chrono::{DateTime, Utc};
use sqlx::{query, query_as};
use tracing::debug;

const PROJECT_COLUMNS: &str = "p.id, p.owner_user_id, p.title, p.created_at, p.updated_at";

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: i32,
    owner_user_id: i32,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(value: ProjectRow) -> Self {
        Project {
            id: value.id,
            owner_user_id: value.owner_user_id,
            title: value.title,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Escapes LIKE wildcards so user input only ever matches literally
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for character in raw.chars() {
        if matches!(character, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(character);
    }

    escaped
}

pub struct DbProjectReader;

impl domain::project::driven_ports::ProjectReader for DbProjectReader {
    async fn projects_for_user(
        &self,
        user_id: i32,
        page: &PageRequest,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Vec<Project>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let projects = query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM project p WHERE p.owner_user_id = $1 \
             ORDER BY p.created_at DESC, p.id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(cxn.borrow_connection())
        .await
        .context("trying to fetch a page of projects for a user")?
        .into_iter()
        .map(Project::from)
        .collect();

        Ok(projects)
    }

    async fn count_for_user(
        &self,
        user_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<i64, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let project_count = query_as::<_, Count>(
            "SELECT count(*) AS count FROM project p WHERE p.owner_user_id = $1",
        )
        .bind(user_id)
        .fetch_one(cxn.borrow_connection())
        .await
        .context("trying to count a user's projects")?;

        Ok(project_count.count())
    }

    async fn project_by_id(
        &self,
        project_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<Project>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let project = query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM project p WHERE p.id = $1"
        ))
        .bind(project_id)
        .fetch_optional(cxn.borrow_connection())
        .await
        .context("trying to fetch a project by ID")?
        .map(Project::from);

        Ok(project)
    }

    async fn search_for_user(
        &self,
        user_id: i32,
        search: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Vec<Project>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let projects = query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM project p WHERE p.owner_user_id = $1 \
             AND p.title ILIKE '%' || $2 || '%' ESCAPE '\\' \
             ORDER BY p.created_at DESC, p.id DESC"
        ))
        .bind(user_id)
        .bind(escape_like(search))
        .fetch_all(cxn.borrow_connection())
        .await
        .context("trying to search a user's projects")?
        .into_iter()
        .map(Project::from)
        .collect();

        Ok(projects)
    }
}

pub struct DbDetectProject;

impl domain::project::driven_ports::DetectProject for DbDetectProject {
    async fn project_with_title_exists(
        &self,
        user_id: i32,
        title: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let matching = query_as::<_, Count>(
            "SELECT count(*) AS count FROM project p WHERE p.owner_user_id = $1 AND p.title = $2",
        )
        .bind(user_id)
        .bind(title)
        .fetch_one(cxn.borrow_connection())
        .await
        .context("trying to detect a project by title")?;

        Ok(matching.count() > 0)
    }
}

pub struct DbProjectWriter;

impl domain::project::driven_ports::ProjectWriter for DbProjectWriter {
    async fn create_project(
        &self,
        user_id: i32,
        title: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<Project>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let insert_result = query_as::<_, ProjectRow>(
            "INSERT INTO project(owner_user_id, title) VALUES ($1, $2) \
             RETURNING id, owner_user_id, title, created_at, updated_at",
        )
        .bind(user_id)
        .bind(title)
        .fetch_one(cxn.borrow_connection())
        .await;

        match insert_result {
            Ok(row) => Ok(Some(Project::from(row))),
            Err(err) if is_unique_violation(&err) => {
                debug!("Project title '{title}' was taken by a concurrent insert");
                Ok(None)
            }
            Err(err) => Err(Error::from(err).context("trying to insert a new project")),
        }
    }

    async fn update_title(
        &self,
        project_id: i32,
        title: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<Project>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let update_result = query_as::<_, ProjectRow>(
            "UPDATE project SET title = $1, updated_at = now() WHERE id = $2 \
             RETURNING id, owner_user_id, title, created_at, updated_at",
        )
        .bind(title)
        .bind(project_id)
        .fetch_optional(cxn.borrow_connection())
        .await;

        match update_result {
            Ok(Some(row)) => Ok(Some(Project::from(row))),
            Ok(None) => Err(anyhow!("project {project_id} was removed before it could be renamed")),
            Err(err) if is_unique_violation(&err) => {
                debug!("Project title '{title}' was taken by a concurrent write");
                Ok(None)
            }
            Err(err) => Err(Error::from(err).context("trying to rename a project")),
        }
    }

    async fn delete_project(
        &self,
        project_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        query("DELETE FROM project WHERE id = $1")
            .bind(project_id)
            .execute(cxn.borrow_connection())
            .await
            .context("trying to remove a project from the database")?;

        Ok(())
    }

    async fn copy_tasks(
        &self,
        from_project_id: i32,
        to_project_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<u64, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let copied = query(
            "INSERT INTO task(project_id, text, priority, completed) \
             SELECT $2, t.text, t.priority, t.completed FROM task t WHERE t.project_id = $1 ORDER BY t.id",
        )
        .bind(from_project_id)
        .bind(to_project_id)
        .execute(cxn.borrow_connection())
        .await
        .context("trying to copy tasks between projects")?;

        Ok(copied.rows_affected())
    }
}
