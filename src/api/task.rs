use crate::api::auth::AuthenticatedUser;
use crate::domain::task::driving_ports::{TaskError, TaskPort};
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{
    GenericErrorResponse, Json, Path, Query, ValidationErrorResponse, api_error,
};
use crate::{AppState, SharedData, domain, dto, persistence};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::ErrorResponse;
use axum::routing::{get, patch, post};
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(paths(
    list_tasks,
    create_task,
    project_task_stats,
    update_task,
    delete_task,
    toggle_task,
    reorder_tasks,
))]
/// Defines the OpenAPI documentation for the task API
pub struct TaskApi;
/// Constant used to group task endpoints in OpenAPI documentation
pub const TASK_API_GROUP: &str = "Tasks";

/// Builds a router for the task routes. Paths are absolute since tasks live both under
/// "/projects/:project_id/tasks" and at "/tasks".
pub fn task_routes() -> Router<Arc<SharedData>> {
    Router::new()
        .route(
            "/projects/:project_id/tasks",
            get(
                |AuthenticatedUser(user_id): AuthenticatedUser,
                 State(app_state): AppState,
                 Path(project_id): Path<i32>,
                 Query(list_query): Query<dto::TaskListQuery>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::task::TaskService {};

                    list_tasks(user_id, project_id, list_query, &mut ext_cxn, &task_service).await
                },
            )
            .post(
                |AuthenticatedUser(user_id): AuthenticatedUser,
                 State(app_state): AppState,
                 Path(project_id): Path<i32>,
                 Json(new_task): Json<dto::NewTask>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::task::TaskService {};

                    create_task(user_id, project_id, new_task, &mut ext_cxn, &task_service).await
                },
            ),
        )
        .route(
            "/projects/:project_id/tasks/stats",
            get(
                |AuthenticatedUser(user_id): AuthenticatedUser,
                 State(app_state): AppState,
                 Path(project_id): Path<i32>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::task::TaskService {};

                    project_task_stats(user_id, project_id, &mut ext_cxn, &task_service).await
                },
            ),
        )
        .route(
            "/tasks/reorder",
            post(
                |AuthenticatedUser(user_id): AuthenticatedUser,
                 State(app_state): AppState,
                 Json(reorder): Json<dto::ReorderRequest>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::task::TaskService {};

                    reorder_tasks(user_id, reorder, &mut ext_cxn, &task_service).await
                },
            ),
        )
        .route(
            "/tasks/:task_id",
            patch(
                |AuthenticatedUser(user_id): AuthenticatedUser,
                 State(app_state): AppState,
                 Path(task_id): Path<i32>,
                 Json(update): Json<dto::UpdateTask>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::task::TaskService {};

                    update_task(user_id, task_id, update, &mut ext_cxn, &task_service).await
                },
            )
            .delete(
                |AuthenticatedUser(user_id): AuthenticatedUser,
                 State(app_state): AppState,
                 Path(task_id): Path<i32>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::task::TaskService {};

                    delete_task(user_id, task_id, &mut ext_cxn, &task_service).await
                },
            ),
        )
        .route(
            "/tasks/:task_id/toggle",
            post(
                |AuthenticatedUser(user_id): AuthenticatedUser,
                 State(app_state): AppState,
                 Path(task_id): Path<i32>,
                 Json(toggle): Json<dto::ToggleTask>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::task::TaskService {};

                    toggle_task(user_id, task_id, toggle, &mut ext_cxn, &task_service).await
                },
            ),
        )
}

fn task_error_response(err: TaskError) -> ErrorResponse {
    let description = err.to_string();

    match err {
        TaskError::Invalid(errors) => ValidationErrorResponse::from(errors).into(),
        TaskError::DoesNotExist => api_error(StatusCode::NOT_FOUND, "not_found", description),
        TaskError::NoPermission => api_error(StatusCode::FORBIDDEN, "forbidden", description),
        TaskError::ProjectDoesNotExist => {
            api_error(StatusCode::NOT_FOUND, "project_not_found", description)
        }
        TaskError::EmptyReorder => {
            api_error(StatusCode::BAD_REQUEST, "empty_reorder", description)
        }
        TaskError::PortError(cause) => GenericErrorResponse(cause).into(),
    }
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/tasks",
    tag = TASK_API_GROUP,
    params(
        ("X-User-Id" = i32, Header, description = "ID of the acting user"),
        ("project_id" = i32, Path, description = "ID of the project"),
        dto::TaskListQuery,
    ),
    responses(
        (status = 200, description = "Tasks in the project, highest priority first", body = Vec<dto::Task>),
        (status = 400, response = dto::err_resps::BasicError400Validation),
        (status = 401, response = dto::err_resps::BasicError401),
        (status = 404, response = dto::err_resps::BasicError404),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
/// Lists the tasks in one of the acting user's projects
async fn list_tasks(
    user_id: i32,
    project_id: i32,
    list_query: dto::TaskListQuery,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<Json<Vec<dto::Task>>, ErrorResponse> {
    let project_read = persistence::db_project_driven_ports::DbProjectReader;
    let task_read = persistence::db_task_driven_ports::DbTaskReader;
    let options = domain::task::TaskListOptions::from(list_query);

    let tasks = task_service
        .tasks_for_project(
            user_id,
            project_id,
            &options,
            &mut *ext_cxn,
            &project_read,
            &task_read,
        )
        .await
        .map_err(task_error_response)?;

    Ok(Json(tasks.into_iter().map(dto::Task::from).collect()))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/tasks",
    tag = TASK_API_GROUP,
    params(
        ("X-User-Id" = i32, Header, description = "ID of the acting user"),
        ("project_id" = i32, Path, description = "ID of the project"),
    ),
    request_body = dto::NewTask,
    responses(
        (status = 201, description = "Task created", body = dto::Task),
        (status = 400, response = dto::err_resps::BasicError400Validation),
        (status = 401, response = dto::err_resps::BasicError401),
        (status = 404, response = dto::err_resps::BasicError404),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
/// Adds a task to one of the acting user's projects
async fn create_task(
    user_id: i32,
    project_id: i32,
    new_task: dto::NewTask,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<(StatusCode, Json<dto::Task>), ErrorResponse> {
    info!("User {user_id} adding a task to project {project_id}");
    let domain_task = domain::task::NewTask::from(new_task);
    let project_read = persistence::db_project_driven_ports::DbProjectReader;
    let task_read = persistence::db_task_driven_ports::DbTaskReader;
    let task_write = persistence::db_task_driven_ports::DbTaskWriter;

    let created = task_service
        .create_task(
            user_id,
            project_id,
            &domain_task,
            &mut *ext_cxn,
            &project_read,
            &task_read,
            &task_write,
        )
        .await
        .map_err(task_error_response)?;

    Ok((StatusCode::CREATED, Json(dto::Task::from(created))))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/tasks/stats",
    tag = TASK_API_GROUP,
    params(
        ("X-User-Id" = i32, Header, description = "ID of the acting user"),
        ("project_id" = i32, Path, description = "ID of the project"),
    ),
    responses(
        (status = 200, description = "Completion statistics for the project", body = dto::TaskStats),
        (status = 401, response = dto::err_resps::BasicError401),
        (status = 404, response = dto::err_resps::BasicError404),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
async fn project_task_stats(
    user_id: i32,
    project_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<Json<dto::TaskStats>, ErrorResponse> {
    let project_read = persistence::db_project_driven_ports::DbProjectReader;
    let task_read = persistence::db_task_driven_ports::DbTaskReader;

    let stats = task_service
        .task_stats(user_id, project_id, &mut *ext_cxn, &project_read, &task_read)
        .await
        .map_err(task_error_response)?;

    Ok(Json(dto::TaskStats::from(stats)))
}

#[utoipa::path(
    patch,
    path = "/tasks/{task_id}",
    tag = TASK_API_GROUP,
    params(
        ("X-User-Id" = i32, Header, description = "ID of the acting user"),
        ("task_id" = i32, Path, description = "ID of the task"),
    ),
    request_body = dto::UpdateTask,
    responses(
        (status = 200, description = "Task updated", body = dto::Task),
        (status = 400, response = dto::err_resps::BasicError400Validation),
        (status = 401, response = dto::err_resps::BasicError401),
        (status = 403, response = dto::err_resps::BasicError403),
        (status = 404, response = dto::err_resps::BasicError404),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
/// Changes a task's text or priority
async fn update_task(
    user_id: i32,
    task_id: i32,
    update: dto::UpdateTask,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<Json<dto::Task>, ErrorResponse> {
    debug!("Updating task {task_id} with {update:?}");
    let domain_update = domain::task::UpdateTask::from(update);
    let task_read = persistence::db_task_driven_ports::DbTaskReader;
    let task_write = persistence::db_task_driven_ports::DbTaskWriter;

    let updated = task_service
        .update_task(
            user_id,
            task_id,
            &domain_update,
            &mut *ext_cxn,
            &task_read,
            &task_write,
        )
        .await
        .map_err(task_error_response)?;

    Ok(Json(dto::Task::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/tasks/{task_id}",
    tag = TASK_API_GROUP,
    params(
        ("X-User-Id" = i32, Header, description = "ID of the acting user"),
        ("task_id" = i32, Path, description = "ID of the task"),
    ),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 401, response = dto::err_resps::BasicError401),
        (status = 403, response = dto::err_resps::BasicError403),
        (status = 404, response = dto::err_resps::BasicError404),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
async fn delete_task(
    user_id: i32,
    task_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<StatusCode, ErrorResponse> {
    let task_read = persistence::db_task_driven_ports::DbTaskReader;
    let task_write = persistence::db_task_driven_ports::DbTaskWriter;

    task_service
        .delete_task(user_id, task_id, &mut *ext_cxn, &task_read, &task_write)
        .await
        .map_err(task_error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/tasks/{task_id}/toggle",
    tag = TASK_API_GROUP,
    params(
        ("X-User-Id" = i32, Header, description = "ID of the acting user"),
        ("task_id" = i32, Path, description = "ID of the task"),
    ),
    request_body = dto::ToggleTask,
    responses(
        (status = 200, description = "Task completion state changed", body = dto::ToggledTask),
        (status = 400, response = dto::err_resps::BasicError400Validation),
        (status = 401, response = dto::err_resps::BasicError401),
        (status = 403, response = dto::err_resps::BasicError403),
        (status = 404, response = dto::err_resps::BasicError404),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
/// Marks a task as completed or not completed
async fn toggle_task(
    user_id: i32,
    task_id: i32,
    toggle: dto::ToggleTask,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<Json<dto::ToggledTask>, ErrorResponse> {
    let task_read = persistence::db_task_driven_ports::DbTaskReader;
    let task_write = persistence::db_task_driven_ports::DbTaskWriter;

    let toggled = task_service
        .toggle_completion(
            user_id,
            task_id,
            toggle.completed,
            &mut *ext_cxn,
            &task_read,
            &task_write,
        )
        .await
        .map_err(task_error_response)?;

    Ok(Json(dto::ToggledTask {
        status: "success".to_owned(),
        completed: toggled.completed,
    }))
}

#[utoipa::path(
    post,
    path = "/tasks/reorder",
    tag = TASK_API_GROUP,
    params(("X-User-Id" = i32, Header, description = "ID of the acting user")),
    request_body = dto::ReorderRequest,
    responses(
        (status = 200, description = "Priorities applied. Entries that couldn't be applied are skipped.", body = dto::ReorderResult),
        (status = 400, response = dto::err_resps::BasicError400Validation),
        (status = 401, response = dto::err_resps::BasicError401),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
/// Applies new priorities to a batch of the acting user's tasks
async fn reorder_tasks(
    user_id: i32,
    reorder: dto::ReorderRequest,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<Json<dto::ReorderResult>, ErrorResponse> {
    let entries: Vec<domain::task::ReorderEntry> = reorder
        .order
        .iter()
        .map(domain::task::ReorderEntry::from)
        .collect();
    let task_read = persistence::db_task_driven_ports::DbTaskReader;
    let task_write = persistence::db_task_driven_ports::DbTaskWriter;

    let outcome = task_service
        .reorder_tasks(user_id, &entries, &mut *ext_cxn, &task_read, &task_write)
        .await
        .map_err(task_error_response)?;

    Ok(Json(dto::ReorderResult::from(outcome)))
}
