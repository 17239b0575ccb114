use super::NewId;
use crate::domain;
use crate::domain::task::{Task, TaskCounts, UpdateTask};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};
use sqlx::{query, query_as};

/// Tasks always come back joined with their project so the owner is known
const TASK_SELECT: &str = "SELECT t.id, t.project_id, p.owner_user_id, t.text, t.priority, t.completed \
    FROM task t JOIN project p ON p.id = t.project_id";

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: i32,
    project_id: i32,
    owner_user_id: i32,
    text: String,
    priority: i32,
    completed: bool,
}

impl From<TaskRow> for Task {
    fn from(value: TaskRow) -> Self {
        Task {
            id: value.id,
            project_id: value.project_id,
            owner_user_id: value.owner_user_id,
            text: value.text,
            priority: value.priority,
            completed: value.completed,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MaxPriority {
    max_priority: Option<i32>,
}

#[derive(sqlx::FromRow)]
struct CompletedCount {
    total: Option<i64>,
    completed: Option<i64>,
}

pub struct DbTaskReader;

impl domain::task::driven_ports::TaskReader for DbTaskReader {
    async fn tasks_for_project(
        &self,
        project_id: i32,
        limit: Option<u32>,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Vec<Task>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        // LIMIT NULL means no limit in PostgreSQL
        let tasks: Vec<Task> = query_as::<_, TaskRow>(&format!(
            "{TASK_SELECT} WHERE t.project_id = $1 ORDER BY t.priority DESC, t.id ASC LIMIT $2"
        ))
        .bind(project_id)
        .bind(limit.map(i64::from))
        .fetch_all(cxn.borrow_connection())
        .await
        .context("trying to fetch tasks for a project")?
        .into_iter()
        .map(Task::from)
        .collect();

        Ok(tasks)
    }

    async fn task_by_id(
        &self,
        task_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<Task>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let task = query_as::<_, TaskRow>(&format!("{TASK_SELECT} WHERE t.id = $1"))
            .bind(task_id)
            .fetch_optional(cxn.borrow_connection())
            .await
            .context("trying to fetch a task by ID")?
            .map(Task::from);

        Ok(task)
    }

    async fn max_priority(
        &self,
        project_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<i32>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let highest = query_as::<_, MaxPriority>(
            "SELECT max(t.priority) AS max_priority FROM task t WHERE t.project_id = $1",
        )
        .bind(project_id)
        .fetch_one(cxn.borrow_connection())
        .await
        .context("trying to find the highest task priority in a project")?;

        Ok(highest.max_priority)
    }

    async fn task_counts(
        &self,
        project_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<TaskCounts, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let counts = query_as::<_, CompletedCount>(
            "SELECT count(*) AS total, count(*) FILTER (WHERE t.completed) AS completed \
             FROM task t WHERE t.project_id = $1",
        )
        .bind(project_id)
        .fetch_one(cxn.borrow_connection())
        .await
        .context("trying to count tasks in a project")?;

        Ok(TaskCounts {
            total: counts.total.unwrap_or_default(),
            completed: counts.completed.unwrap_or_default(),
        })
    }
}

pub struct DbTaskWriter;

impl domain::task::driven_ports::TaskWriter for DbTaskWriter {
    async fn create_task(
        &self,
        project_id: i32,
        text: &str,
        priority: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<i32, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let new_id = query_as::<_, NewId>(
            "INSERT INTO task(project_id, text, priority) VALUES ($1, $2, $3) RETURNING task.id",
        )
        .bind(project_id)
        .bind(text)
        .bind(priority)
        .fetch_one(cxn.borrow_connection())
        .await
        .context("trying to insert a new task into the database")?;

        Ok(new_id.id)
    }

    async fn update_task(
        &self,
        task_id: i32,
        update: &UpdateTask,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        query(
            "UPDATE task SET text = COALESCE($1, text), priority = COALESCE($2, priority) \
             WHERE id = $3",
        )
        .bind(update.text.as_deref())
        .bind(update.priority)
        .bind(task_id)
        .execute(cxn.borrow_connection())
        .await
        .context("trying to update a task in the database")?;

        Ok(())
    }

    async fn delete_task(&self, task_id: i32, ext_cxn: &mut impl ExternalConnectivity) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        query("DELETE FROM task WHERE id = $1")
            .bind(task_id)
            .execute(cxn.borrow_connection())
            .await
            .context("trying to remove a task from the database")?;

        Ok(())
    }

    async fn set_completed(
        &self,
        task_id: i32,
        completed: bool,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        query("UPDATE task SET completed = $1 WHERE id = $2")
            .bind(completed)
            .bind(task_id)
            .execute(cxn.borrow_connection())
            .await
            .context("trying to set task completion")?;

        Ok(())
    }

    async fn set_priority(
        &self,
        task_id: i32,
        priority: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        query("UPDATE task SET priority = $1 WHERE id = $2")
            .bind(priority)
            .bind(task_id)
            .execute(cxn.borrow_connection())
            .await
            .context("trying to change a task's priority")?;

        Ok(())
    }
}
