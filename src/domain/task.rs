use crate::domain;
use crate::domain::project::ProjectAccessErr;
use crate::domain::project::driven_ports::ProjectReader;
use crate::domain::reject_forbidden_chars;
use crate::domain::task::driven_ports::{TaskReader, TaskWriter};
use crate::domain::task::driving_ports::TaskError;
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use thiserror::Error;
use tracing::{debug, info, warn};
use validator::Validate;

/// Highest priority a task may hold. Reorders beyond it are skipped.
pub const MAX_TASK_PRIORITY: i32 = 32767;

/// A to-do item inside a project. `owner_user_id` is the owner of that project.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Task {
    pub id: i32,
    pub project_id: i32,
    pub owner_user_id: i32,
    pub text: String,
    pub priority: i32,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct NewTask {
    #[validate(length(min = 1, max = 64), custom = "reject_forbidden_chars")]
    pub text: String,
    /// Placed at the top of the project when absent
    #[validate(range(min = 1, max = 1000))]
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct UpdateTask {
    #[validate(length(min = 1, max = 64), custom = "reject_forbidden_chars")]
    pub text: Option<String>,
    #[validate(range(min = 1, max = 1000))]
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Validate)]
pub struct TaskListOptions {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}

/// One requested move. Either side is None when the client sent something that
/// wasn't an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderEntry {
    pub task_id: Option<i32>,
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReorderOutcome {
    pub updated: u32,
    pub skipped: u32,
}

/// Raw task counts for one project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskCounts {
    pub total: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskStats {
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub active_tasks: i64,
    /// Percentage of tasks completed, 0 for a project with no tasks
    pub completion_rate: f64,
}

impl From<TaskCounts> for TaskStats {
    fn from(counts: TaskCounts) -> Self {
        let completion_rate = if counts.total > 0 {
            counts.completed as f64 / counts.total as f64 * 100.0
        } else {
            0.0
        };

        TaskStats {
            total_tasks: counts.total,
            completed_tasks: counts.completed,
            active_tasks: counts.total - counts.completed,
            completion_rate,
        }
    }
}

pub mod driven_ports {
    use super::*;

    pub trait TaskReader: Sync {
        /// Highest priority first, ties broken by id
        async fn tasks_for_project(
            &self,
            project_id: i32,
            limit: Option<u32>,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Vec<Task>, anyhow::Error>;
        async fn task_by_id(
            &self,
            task_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<Task>, anyhow::Error>;
        async fn max_priority(
            &self,
            project_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<i32>, anyhow::Error>;
        async fn task_counts(
            &self,
            project_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<TaskCounts, anyhow::Error>;
    }

    pub trait TaskWriter: Sync {
        async fn create_task(
            &self,
            project_id: i32,
            text: &str,
            priority: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<i32, anyhow::Error>;
        /// Only the fields which are present get written
        async fn update_task(
            &self,
            task_id: i32,
            update: &UpdateTask,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
        async fn delete_task(
            &self,
            task_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
        async fn set_completed(
            &self,
            task_id: i32,
            completed: bool,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
        async fn set_priority(
            &self,
            task_id: i32,
            priority: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;
    use validator::ValidationErrors;

    #[derive(Debug, Error)]
    pub enum TaskError {
        #[error("task input was invalid: {0}")]
        Invalid(#[from] ValidationErrors),
        #[error("Task not found.")]
        DoesNotExist,
        #[error("You don't have permission to modify this task.")]
        NoPermission,
        #[error("Project not found.")]
        ProjectDoesNotExist,
        #[error("Order data cannot be empty.")]
        EmptyReorder,
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    impl From<ProjectAccessErr> for TaskError {
        fn from(value: ProjectAccessErr) -> Self {
            match value {
                ProjectAccessErr::NotFound | ProjectAccessErr::NotOwner => {
                    TaskError::ProjectDoesNotExist
                }
                ProjectAccessErr::PortError(err) => TaskError::PortError(err),
            }
        }
    }


    pub trait TaskPort {
        async fn tasks_for_project(
            &self,
            user_id: i32,
            project_id: i32,
            options: &TaskListOptions,
            ext_cxn: &mut impl ExternalConnectivity,
            p_read: &impl ProjectReader,
            t_read: &impl TaskReader,
        ) -> Result<Vec<Task>, TaskError>;
        async fn create_task(
            &self,
            user_id: i32,
            project_id: i32,
            task: &NewTask,
            ext_cxn: &mut impl ExternalConnectivity,
            p_read: &impl ProjectReader,
            t_read: &impl TaskReader,
            t_write: &impl TaskWriter,
        ) -> Result<Task, TaskError>;
        async fn update_task(
            &self,
            user_id: i32,
            task_id: i32,
            update: &UpdateTask,
            ext_cxn: &mut impl ExternalConnectivity,
            t_read: &impl TaskReader,
            t_write: &impl TaskWriter,
        ) -> Result<Task, TaskError>;
        async fn delete_task(
            &self,
            user_id: i32,
            task_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
            t_read: &impl TaskReader,
            t_write: &impl TaskWriter,
        ) -> Result<(), TaskError>;
        async fn toggle_completion(
            &self,
            user_id: i32,
            task_id: i32,
            completed: bool,
            ext_cxn: &mut impl ExternalConnectivity,
            t_read: &impl TaskReader,
            t_write: &impl TaskWriter,
        ) -> Result<Task, TaskError>;
        async fn reorder_tasks(
            &self,
            user_id: i32,
            entries: &[ReorderEntry],
            ext_cxn: &mut impl ExternalConnectivity,
            t_read: &impl TaskReader,
            t_write: &impl TaskWriter,
        ) -> Result<ReorderOutcome, TaskError>;
        async fn task_stats(
            &self,
            user_id: i32,
            project_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
            p_read: &impl ProjectReader,
            t_read: &impl TaskReader,
        ) -> Result<TaskStats, TaskError>;
    }
}

/// Looks up a task and confirms it sits in a project owned by the given user
async fn owned_task(
    user_id: i32,
    task_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    t_read: &impl TaskReader,
) -> Result<Task, TaskError> {
    let task = t_read
        .task_by_id(task_id, ext_cxn)
        .await
        .context("looking up a task")?
        .ok_or(TaskError::DoesNotExist)?;

    if task.owner_user_id != user_id {
        warn!("User {user_id} tried to modify task {task_id} in someone else's project");
        return Err(TaskError::NoPermission);
    }

    Ok(task)
}

pub struct TaskService {}

impl driving_ports::TaskPort for TaskService {
    async fn tasks_for_project(
        &self,
        user_id: i32,
        project_id: i32,
        options: &TaskListOptions,
        ext_cxn: &mut impl ExternalConnectivity,
        p_read: &impl ProjectReader,
        t_read: &impl TaskReader,
    ) -> Result<Vec<Task>, TaskError> {
        options.validate()?;
        domain::project::verify_project_owner(user_id, project_id, &mut *ext_cxn, p_read).await?;

        Ok(t_read
            .tasks_for_project(project_id, options.limit, &mut *ext_cxn)
            .await
            .context("listing tasks for a project")?)
    }

    async fn create_task(
        &self,
        user_id: i32,
        project_id: i32,
        task: &NewTask,
        ext_cxn: &mut impl ExternalConnectivity,
        p_read: &impl ProjectReader,
        t_read: &impl TaskReader,
        t_write: &impl TaskWriter,
    ) -> Result<Task, TaskError> {
        let task = NewTask {
            text: task.text.trim().to_owned(),
            priority: task.priority,
        };
        task.validate()?;

        let project =
            domain::project::verify_project_owner(user_id, project_id, &mut *ext_cxn, p_read)
                .await?;

        let priority = match task.priority {
            Some(priority) => priority,
            None => {
                let current_max = t_read
                    .max_priority(project_id, &mut *ext_cxn)
                    .await
                    .context("finding the top priority in a project")?;
                current_max
                    .unwrap_or_default()
                    .saturating_add(1)
                    .min(MAX_TASK_PRIORITY)
            }
        };

        let task_id = t_write
            .create_task(project_id, &task.text, priority, &mut *ext_cxn)
            .await
            .context("creating a task")?;

        info!("Task created in project '{}' by user {user_id}", project.title);
        Ok(Task {
            id: task_id,
            project_id,
            owner_user_id: project.owner_user_id,
            text: task.text,
            priority,
            completed: false,
        })
    }

    async fn update_task(
        &self,
        user_id: i32,
        task_id: i32,
        update: &UpdateTask,
        ext_cxn: &mut impl ExternalConnectivity,
        t_read: &impl TaskReader,
        t_write: &impl TaskWriter,
    ) -> Result<Task, TaskError> {
        let mut task = owned_task(user_id, task_id, &mut *ext_cxn, t_read).await?;

        let update = UpdateTask {
            text: update.text.as_deref().map(|text| text.trim().to_owned()),
            priority: update.priority,
        };
        update.validate()?;

        if update.text.is_none() && update.priority.is_none() {
            debug!("Nothing to change on task {task_id}");
            return Ok(task);
        }

        t_write
            .update_task(task_id, &update, &mut *ext_cxn)
            .await
            .context("updating a task")?;

        if let Some(text) = update.text {
            task.text = text;
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }

        info!("Task {task_id} updated by user {user_id}");
        Ok(task)
    }

    async fn delete_task(
        &self,
        user_id: i32,
        task_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
        t_read: &impl TaskReader,
        t_write: &impl TaskWriter,
    ) -> Result<(), TaskError> {
        owned_task(user_id, task_id, &mut *ext_cxn, t_read).await?;

        t_write
            .delete_task(task_id, &mut *ext_cxn)
            .await
            .context("deleting a task")?;

        info!("Task {task_id} deleted by user {user_id}");
        Ok(())
    }

    async fn toggle_completion(
        &self,
        user_id: i32,
        task_id: i32,
        completed: bool,
        ext_cxn: &mut impl ExternalConnectivity,
        t_read: &impl TaskReader,
        t_write: &impl TaskWriter,
    ) -> Result<Task, TaskError> {
        let mut task = owned_task(user_id, task_id, &mut *ext_cxn, t_read).await?;

        t_write
            .set_completed(task_id, completed, &mut *ext_cxn)
            .await
            .context("toggling task completion")?;
        task.completed = completed;

        Ok(task)
    }

    async fn reorder_tasks(
        &self,
        user_id: i32,
        entries: &[ReorderEntry],
        ext_cxn: &mut impl ExternalConnectivity,
        t_read: &impl TaskReader,
        t_write: &impl TaskWriter,
    ) -> Result<ReorderOutcome, TaskError> {
        if entries.is_empty() {
            return Err(TaskError::EmptyReorder);
        }

        let mut outcome = ReorderOutcome::default();
        for entry in entries {
            let (Some(task_id), Some(position)) = (entry.task_id, entry.position) else {
                outcome.skipped += 1;
                continue;
            };
            if !(0..=MAX_TASK_PRIORITY).contains(&position) {
                outcome.skipped += 1;
                continue;
            }

            match owned_task(user_id, task_id, &mut *ext_cxn, t_read).await {
                Ok(_) => {}
                Err(TaskError::DoesNotExist | TaskError::NoPermission) => {
                    outcome.skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            }

            t_write
                .set_priority(task_id, position, &mut *ext_cxn)
                .await
                .context("moving a task during reorder")?;
            outcome.updated += 1;
        }

        debug!(
            "Reorder by user {user_id} moved {} tasks and skipped {}",
            outcome.updated, outcome.skipped
        );
        Ok(outcome)
    }

    async fn task_stats(
        &self,
        user_id: i32,
        project_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
        p_read: &impl ProjectReader,
        t_read: &impl TaskReader,
    ) -> Result<TaskStats, TaskError> {
        domain::project::verify_project_owner(user_id, project_id, &mut *ext_cxn, p_read).await?;

        let counts = t_read
            .task_counts(project_id, &mut *ext_cxn)
            .await
            .context("counting tasks for stats")?;

        Ok(TaskStats::from(counts))
    }
}
