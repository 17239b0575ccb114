use crate::api::auth::AuthenticatedUser;
use crate::domain::project::driving_ports::{ProjectError, ProjectPort};
use crate::external_connections::{ExternalConnectivity, Transactable};
use crate::routing_utils::{
    GenericErrorResponse, Json, Path, Query, ValidationErrorResponse, api_error,
};
use crate::{AppState, SharedData, domain, dto, persistence};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::ErrorResponse;
use axum::routing::{get, post};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(paths(
    list_projects,
    create_project,
    search_projects,
    project_stats,
    get_project,
    update_project,
    delete_project,
    duplicate_project,
))]
/// Defines the OpenAPI documentation for the project API
pub struct ProjectApi;
/// Constant used to group project endpoints in OpenAPI documentation
pub const PROJECT_API_GROUP: &str = "Projects";

/// Builds a router for everything under "/projects" except a project's tasks
pub fn project_routes() -> Router<Arc<SharedData>> {
    Router::new()
        .route(
            "/",
            get(
                |AuthenticatedUser(user_id): AuthenticatedUser,
                 State(app_state): AppState,
                 Query(page): Query<dto::ProjectPageQuery>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let project_service = domain::project::ProjectService {};

                    list_projects(user_id, page, &mut ext_cxn, &project_service).await
                },
            )
            .post(
                |AuthenticatedUser(user_id): AuthenticatedUser,
                 State(app_state): AppState,
                 Json(new_project): Json<dto::NewProject>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let project_service = domain::project::ProjectService {};

                    create_project(user_id, new_project, &mut ext_cxn, &project_service).await
                },
            ),
        )
        .route(
            "/search",
            get(
                |AuthenticatedUser(user_id): AuthenticatedUser,
                 State(app_state): AppState,
                 Query(search): Query<dto::ProjectSearchQuery>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let project_service = domain::project::ProjectService {};

                    search_projects(user_id, search, &mut ext_cxn, &project_service).await
                },
            ),
        )
        .route(
            "/stats",
            get(
                |AuthenticatedUser(user_id): AuthenticatedUser, State(app_state): AppState| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let project_service = domain::project::ProjectService {};

                    project_stats(user_id, &mut ext_cxn, &project_service).await
                },
            ),
        )
        .route(
            "/:project_id",
            get(
                |AuthenticatedUser(user_id): AuthenticatedUser,
                 State(app_state): AppState,
                 Path(project_id): Path<i32>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let project_service = domain::project::ProjectService {};

                    get_project(user_id, project_id, &mut ext_cxn, &project_service).await
                },
            )
            .patch(
                |AuthenticatedUser(user_id): AuthenticatedUser,
                 State(app_state): AppState,
                 Path(project_id): Path<i32>,
                 Json(update): Json<dto::UpdateProject>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let project_service = domain::project::ProjectService {};

                    update_project(user_id, project_id, update, &mut ext_cxn, &project_service).await
                },
            )
            .delete(
                |AuthenticatedUser(user_id): AuthenticatedUser,
                 State(app_state): AppState,
                 Path(project_id): Path<i32>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let project_service = domain::project::ProjectService {};

                    delete_project(user_id, project_id, &mut ext_cxn, &project_service).await
                },
            ),
        )
        .route(
            "/:project_id/duplicate",
            post(
                |AuthenticatedUser(user_id): AuthenticatedUser,
                 State(app_state): AppState,
                 Path(project_id): Path<i32>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let project_service = domain::project::ProjectService {};

                    duplicate_project(user_id, project_id, &mut ext_cxn, &project_service).await
                },
            ),
        )
}

/// Maps a failed project operation onto the API's error responses
fn project_error_response(err: ProjectError) -> ErrorResponse {
    let description = err.to_string();

    match err {
        ProjectError::Invalid(errors) => ValidationErrorResponse::from(errors).into(),
        ProjectError::AlreadyExists(_) => {
            api_error(StatusCode::CONFLICT, "already_exists", description)
        }
        ProjectError::DoesNotExist => api_error(StatusCode::NOT_FOUND, "not_found", description),
        ProjectError::NoPermission => api_error(StatusCode::FORBIDDEN, "forbidden", description),
        ProjectError::UserDoesNotExist => {
            api_error(StatusCode::NOT_FOUND, "user_not_found", description)
        }
        ProjectError::PortError(cause) => GenericErrorResponse(cause).into(),
    }
}

#[utoipa::path(
    get,
    path = "/projects",
    tag = PROJECT_API_GROUP,
    params(
        ("X-User-Id" = i32, Header, description = "ID of the acting user"),
        dto::ProjectPageQuery,
    ),
    responses(
        (status = 200, description = "A page of the user's projects, newest first", body = dto::ProjectPage),
        (status = 400, response = dto::err_resps::BasicError400Validation),
        (status = 401, response = dto::err_resps::BasicError401),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
/// Lists the acting user's projects one page at a time
async fn list_projects(
    user_id: i32,
    page: dto::ProjectPageQuery,
    ext_cxn: &mut impl ExternalConnectivity,
    project_service: &impl ProjectPort,
) -> Result<Json<dto::ProjectPage>, ErrorResponse> {
    let project_read = persistence::db_project_driven_ports::DbProjectReader;
    let page_request = domain::project::PageRequest::from(page);

    let project_page = project_service
        .user_projects(user_id, &page_request, &mut *ext_cxn, &project_read)
        .await
        .map_err(project_error_response)?;

    Ok(Json(dto::ProjectPage::from(project_page)))
}

#[utoipa::path(
    post,
    path = "/projects",
    tag = PROJECT_API_GROUP,
    params(("X-User-Id" = i32, Header, description = "ID of the acting user")),
    request_body = dto::NewProject,
    responses(
        (status = 201, description = "Project created", body = dto::Project),
        (status = 400, response = dto::err_resps::BasicError400Validation),
        (status = 401, response = dto::err_resps::BasicError401),
        (status = 404, response = dto::err_resps::BasicError404),
        (status = 409, response = dto::err_resps::BasicError409),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
/// Creates a project owned by the acting user
async fn create_project(
    user_id: i32,
    new_project: dto::NewProject,
    ext_cxn: &mut impl ExternalConnectivity,
    project_service: &impl ProjectPort,
) -> Result<(StatusCode, Json<dto::Project>), ErrorResponse> {
    info!("User {user_id} creating project '{}'", new_project.title);
    let domain_project = domain::project::NewProject::from(new_project);
    let user_detect = persistence::db_user_driven_ports::DbDetectUser;
    let project_detect = persistence::db_project_driven_ports::DbDetectProject;
    let project_write = persistence::db_project_driven_ports::DbProjectWriter;

    let created = project_service
        .create_project(
            user_id,
            &domain_project,
            &mut *ext_cxn,
            &user_detect,
            &project_detect,
            &project_write,
        )
        .await
        .map_err(project_error_response)?;

    Ok((StatusCode::CREATED, Json(dto::Project::from(created))))
}

#[utoipa::path(
    get,
    path = "/projects/search",
    tag = PROJECT_API_GROUP,
    params(
        ("X-User-Id" = i32, Header, description = "ID of the acting user"),
        dto::ProjectSearchQuery,
    ),
    responses(
        (status = 200, description = "Projects whose titles contain the query", body = Vec<dto::Project>),
        (status = 400, response = dto::err_resps::BasicError400Validation),
        (status = 401, response = dto::err_resps::BasicError401),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
/// Searches the acting user's projects by title
async fn search_projects(
    user_id: i32,
    search: dto::ProjectSearchQuery,
    ext_cxn: &mut impl ExternalConnectivity,
    project_service: &impl ProjectPort,
) -> Result<Json<Vec<dto::Project>>, ErrorResponse> {
    let project_read = persistence::db_project_driven_ports::DbProjectReader;
    let query = domain::project::SearchQuery::from(search);

    let found = project_service
        .search_projects(user_id, &query, &mut *ext_cxn, &project_read)
        .await
        .map_err(project_error_response)?;

    Ok(Json(found.into_iter().map(dto::Project::from).collect()))
}

#[utoipa::path(
    get,
    path = "/projects/stats",
    tag = PROJECT_API_GROUP,
    params(("X-User-Id" = i32, Header, description = "ID of the acting user")),
    responses(
        (status = 200, description = "Project statistics for the user", body = dto::ProjectStats),
        (status = 401, response = dto::err_resps::BasicError401),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
async fn project_stats(
    user_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    project_service: &impl ProjectPort,
) -> Result<Json<dto::ProjectStats>, ErrorResponse> {
    let project_read = persistence::db_project_driven_ports::DbProjectReader;

    let stats = project_service
        .project_stats(user_id, &mut *ext_cxn, &project_read)
        .await
        .map_err(project_error_response)?;

    Ok(Json(dto::ProjectStats::from(stats)))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}",
    tag = PROJECT_API_GROUP,
    params(
        ("X-User-Id" = i32, Header, description = "ID of the acting user"),
        ("project_id" = i32, Path, description = "ID of the project"),
    ),
    responses(
        (status = 200, description = "The requested project", body = dto::Project),
        (status = 401, response = dto::err_resps::BasicError401),
        (status = 403, response = dto::err_resps::BasicError403),
        (status = 404, response = dto::err_resps::BasicError404),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
/// Retrieves one of the acting user's projects
async fn get_project(
    user_id: i32,
    project_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    project_service: &impl ProjectPort,
) -> Result<Json<dto::Project>, ErrorResponse> {
    let project_read = persistence::db_project_driven_ports::DbProjectReader;

    let project = project_service
        .project_for_user(user_id, project_id, &mut *ext_cxn, &project_read)
        .await
        .map_err(project_error_response)?;

    Ok(Json(dto::Project::from(project)))
}

#[utoipa::path(
    patch,
    path = "/projects/{project_id}",
    tag = PROJECT_API_GROUP,
    params(
        ("X-User-Id" = i32, Header, description = "ID of the acting user"),
        ("project_id" = i32, Path, description = "ID of the project"),
    ),
    request_body = dto::UpdateProject,
    responses(
        (status = 200, description = "Project renamed", body = dto::Project),
        (status = 400, response = dto::err_resps::BasicError400Validation),
        (status = 401, response = dto::err_resps::BasicError401),
        (status = 403, response = dto::err_resps::BasicError403),
        (status = 404, response = dto::err_resps::BasicError404),
        (status = 409, response = dto::err_resps::BasicError409),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
/// Renames a project
async fn update_project(
    user_id: i32,
    project_id: i32,
    update: dto::UpdateProject,
    ext_cxn: &mut impl ExternalConnectivity,
    project_service: &impl ProjectPort,
) -> Result<Json<dto::Project>, ErrorResponse> {
    let domain_update = domain::project::UpdateProject::from(update);
    let project_read = persistence::db_project_driven_ports::DbProjectReader;
    let project_detect = persistence::db_project_driven_ports::DbDetectProject;
    let project_write = persistence::db_project_driven_ports::DbProjectWriter;

    let updated = project_service
        .update_project(
            user_id,
            project_id,
            &domain_update,
            &mut *ext_cxn,
            &project_read,
            &project_detect,
            &project_write,
        )
        .await
        .map_err(project_error_response)?;

    Ok(Json(dto::Project::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/projects/{project_id}",
    tag = PROJECT_API_GROUP,
    params(
        ("X-User-Id" = i32, Header, description = "ID of the acting user"),
        ("project_id" = i32, Path, description = "ID of the project"),
    ),
    responses(
        (status = 204, description = "Project and its tasks deleted"),
        (status = 401, response = dto::err_resps::BasicError401),
        (status = 403, response = dto::err_resps::BasicError403),
        (status = 404, response = dto::err_resps::BasicError404),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
#[tracing::instrument(skip(ext_cxn, project_service))]
/// Deletes a project along with all of its tasks
async fn delete_project(
    user_id: i32,
    project_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    project_service: &impl ProjectPort,
) -> Result<StatusCode, ErrorResponse> {
    let project_read = persistence::db_project_driven_ports::DbProjectReader;
    let project_write = persistence::db_project_driven_ports::DbProjectWriter;

    let delete_result = project_service
        .delete_project(user_id, project_id, &mut *ext_cxn, &project_read, &project_write)
        .await;
    if let Err(ProjectError::NoPermission) = delete_result {
        warn!("Refused to delete project {project_id} for user {user_id}");
    }

    delete_result.map_err(project_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/duplicate",
    tag = PROJECT_API_GROUP,
    params(
        ("X-User-Id" = i32, Header, description = "ID of the acting user"),
        ("project_id" = i32, Path, description = "ID of the project to copy"),
    ),
    responses(
        (status = 201, description = "Copy of the project and its tasks", body = dto::Project),
        (status = 401, response = dto::err_resps::BasicError401),
        (status = 403, response = dto::err_resps::BasicError403),
        (status = 404, response = dto::err_resps::BasicError404),
        (status = 409, response = dto::err_resps::BasicError409),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
#[tracing::instrument(skip(ext_cxn, project_service))]
/// Copies a project and all of its tasks under a "(Copy)" title
async fn duplicate_project(
    user_id: i32,
    project_id: i32,
    ext_cxn: &mut impl Transactable,
    project_service: &impl ProjectPort,
) -> Result<(StatusCode, Json<dto::Project>), ErrorResponse> {
    let project_read = persistence::db_project_driven_ports::DbProjectReader;
    let project_detect = persistence::db_project_driven_ports::DbDetectProject;
    let project_write = persistence::db_project_driven_ports::DbProjectWriter;

    let copy = project_service
        .duplicate_project(
            user_id,
            project_id,
            &mut *ext_cxn,
            &project_read,
            &project_detect,
            &project_write,
        )
        .await
        .map_err(project_error_response)?;

    Ok((StatusCode::CREATED, Json(dto::Project::from(copy))))
}
