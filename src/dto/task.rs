use crate::domain;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

/// DTO for a returned task on the API
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug, PartialEq, Eq))]
pub struct Task {
    #[schema(example = 10)]
    pub id: i32,
    #[schema(example = 3)]
    pub project_id: i32,
    #[schema(example = "Buy milk")]
    pub text: String,
    #[schema(example = 2)]
    pub priority: i32,
    #[schema(example = false)]
    pub completed: bool,
}

impl From<domain::task::Task> for Task {
    fn from(value: domain::task::Task) -> Self {
        Task {
            id: value.id,
            project_id: value.project_id,
            text: value.text,
            priority: value.priority,
            completed: value.completed,
        }
    }
}

/// DTO for creating a new task via the API
#[derive(Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct NewTask {
    #[schema(example = "Buy milk")]
    pub text: String,
    /// Defaults to one above the highest priority in the project
    #[schema(example = 5)]
    pub priority: Option<i32>,
}

impl From<NewTask> for domain::task::NewTask {
    fn from(value: NewTask) -> Self {
        domain::task::NewTask {
            text: value.text,
            priority: value.priority,
        }
    }
}

/// DTO for changing a task's content via the API. Absent fields are left alone.
#[derive(Debug, Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct UpdateTask {
    #[schema(example = "Buy oat milk")]
    pub text: Option<String>,
    #[schema(example = 7)]
    pub priority: Option<i32>,
}

impl From<UpdateTask> for domain::task::UpdateTask {
    fn from(value: UpdateTask) -> Self {
        domain::task::UpdateTask {
            text: value.text,
            priority: value.priority,
        }
    }
}

#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct TaskListQuery {
    /// Maximum number of tasks to return, at most 100
    #[param(example = 20)]
    pub limit: Option<u32>,
}

impl From<TaskListQuery> for domain::task::TaskListOptions {
    fn from(value: TaskListQuery) -> Self {
        domain::task::TaskListOptions { limit: value.limit }
    }
}

#[derive(Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct ToggleTask {
    #[schema(example = true)]
    pub completed: bool,
}

#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct ToggledTask {
    #[schema(example = "success")]
    pub status: String,
    #[schema(example = true)]
    pub completed: bool,
}

/// One moved task as sent by the front end. Both values may be integers or integer strings.
#[derive(Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct ReorderItem {
    #[serde(default)]
    #[schema(value_type = String, example = "12")]
    pub id: Value,
    #[serde(default)]
    #[schema(value_type = i32, example = 1)]
    pub position: Value,
}

/// Reads an integer out of a JSON number or a string holding one
fn lenient_int(value: &Value) -> Option<i32> {
    match value {
        Value::Number(number) => number.as_i64().and_then(|raw| i32::try_from(raw).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

impl From<&ReorderItem> for domain::task::ReorderEntry {
    fn from(value: &ReorderItem) -> Self {
        domain::task::ReorderEntry {
            task_id: lenient_int(&value.id),
            position: lenient_int(&value.position),
        }
    }
}

/// Batch of moves. The front end also sends the `projectId` it was showing, which is
/// ignored since ownership is checked per task.
#[derive(Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct ReorderRequest {
    #[serde(default)]
    pub order: Vec<ReorderItem>,
}

#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct ReorderResult {
    #[schema(example = "ok")]
    pub status: String,
    #[schema(example = 3)]
    pub updated: u32,
    #[schema(example = 0)]
    pub skipped: u32,
}

impl From<domain::task::ReorderOutcome> for ReorderResult {
    fn from(value: domain::task::ReorderOutcome) -> Self {
        ReorderResult {
            status: "ok".to_owned(),
            updated: value.updated,
            skipped: value.skipped,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug, PartialEq))]
pub struct TaskStats {
    #[schema(example = 3)]
    pub total_tasks: i64,
    #[schema(example = 2)]
    pub completed_tasks: i64,
    #[schema(example = 1)]
    pub active_tasks: i64,
    /// Percentage of tasks completed
    #[schema(example = 66.7)]
    pub completion_rate: f64,
}

impl From<domain::task::TaskStats> for TaskStats {
    fn from(value: domain::task::TaskStats) -> Self {
        TaskStats {
            total_tasks: value.total_tasks,
            completed_tasks: value.completed_tasks,
            active_tasks: value.active_tasks,
            completion_rate: value.completion_rate,
        }
    }
}
