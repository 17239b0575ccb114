use crate::domain::user::driving_ports::CreateUserError;
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{GenericErrorResponse, Json, ValidationErrorResponse, api_error};
use crate::{AppState, SharedData, domain, dto, persistence};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::ErrorResponse;
use axum::routing::get;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(paths(get_users, create_user))]
/// Defines the OpenAPI documentation for the user API
pub struct UsersApi;
/// Constant used to group user endpoints in OpenAPI documentation
pub const USER_API_GROUP: &str = "Users";

/// Builds a router for all the user routes
pub fn user_routes() -> Router<Arc<SharedData>> {
    Router::new().route(
        "/",
        get(|State(app_data): AppState| async move {
            let user_service = domain::user::UserService {};
            let mut external_connectivity = app_data.ext_cxn.clone();

            get_users(&mut external_connectivity, &user_service).await
        })
        .post(
            |State(app_data): AppState, Json(new_user): Json<dto::NewUser>| async move {
                let user_service = domain::user::UserService {};
                let mut external_connectivity = app_data.ext_cxn.clone();

                create_user(new_user, &mut external_connectivity, &user_service).await
            },
        ),
    )
}

#[utoipa::path(
    get,
    path = "/users",
    tag = USER_API_GROUP,
    responses(
        (status = 200, description = "Users in the system", body = Vec<dto::TodoUser>),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
/// Retrieves a list of all the users in the system.
async fn get_users(
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl domain::user::driving_ports::UserPort,
) -> Result<Json<Vec<dto::TodoUser>>, ErrorResponse> {
    info!("Requested users");
    let user_reader = persistence::db_user_driven_ports::DbReadUsers;

    let users = user_service
        .get_users(&mut *ext_cxn, &user_reader)
        .await
        .map_err(GenericErrorResponse)?;

    Ok(Json(users.into_iter().map(dto::TodoUser::from).collect()))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = USER_API_GROUP,
    request_body = dto::NewUser,
    responses(
        (status = 201, description = "User successfully created", body = dto::InsertedUser),
        (status = 400, response = dto::err_resps::BasicError400Validation),
        (status = 409, response = dto::err_resps::BasicError409),
        (status = 500, response = dto::err_resps::BasicError500),
    ),
)]
/// Creates a user.
async fn create_user(
    new_user: dto::NewUser,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl domain::user::driving_ports::UserPort,
) -> Result<(StatusCode, Json<dto::InsertedUser>), ErrorResponse> {
    info!("Attempt to create user: {new_user}");
    let domain_user = domain::user::CreateUser::from(new_user);
    let user_writer = persistence::db_user_driven_ports::DbWriteUsers;
    let user_detect = persistence::db_user_driven_ports::DbDetectUser;

    let creation_result = user_service
        .create_user(&domain_user, &mut *ext_cxn, &user_writer, &user_detect)
        .await;

    match creation_result {
        Ok(id) => Ok((StatusCode::CREATED, Json(dto::InsertedUser { id }))),
        Err(CreateUserError::Invalid(errors)) => Err(ValidationErrorResponse::from(errors).into()),
        Err(CreateUserError::UserAlreadyExists) => Err(api_error(
            StatusCode::CONFLICT,
            "already_exists",
            CreateUserError::UserAlreadyExists.to_string(),
        )),
        Err(CreateUserError::PortError(cause)) => {
            error!("User create failure: {cause}");
            Err(GenericErrorResponse(cause).into())
        }
    }
}
