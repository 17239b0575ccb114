use crate::routing_utils::{BasicErrorResponse, ExtraInfo, ValidationErrorSchema};
use utoipa::OpenApi;

pub mod project;
pub mod task;
pub mod user;

pub use project::*;
pub use task::*;
pub use user::*;

/// Collects every schema and shared response used by the API documentation
#[derive(OpenApi)]
#[openapi(components(
    schemas(
        TodoUser,
        NewUser,
        InsertedUser,
        Project,
        NewProject,
        UpdateProject,
        ProjectPage,
        ProjectStats,
        Task,
        NewTask,
        UpdateTask,
        ToggleTask,
        ToggledTask,
        ReorderItem,
        ReorderRequest,
        ReorderResult,
        TaskStats,
        ExtraInfo,
        ValidationErrorSchema,
    ),
    responses(
        BasicErrorResponse,
        err_resps::BasicError400Validation,
        err_resps::BasicError401,
        err_resps::BasicError403,
        err_resps::BasicError404,
        err_resps::BasicError409,
        err_resps::BasicError500,
    )
))]
pub struct OpenApiSchemas;

/// Documentation-only responses for each of the error statuses the API returns
#[allow(dead_code)]
pub mod err_resps {
    use utoipa::ToResponse;

    #[derive(ToResponse)]
    #[response(
        description = "Submitted data was invalid or malformed",
        example = json!({
            "error_code": "invalid_input",
            "error_description": "Submitted data was invalid.",
            "extra_info": {
                "title": [{ "code": "length", "message": null, "params": { "value": "ab", "min": 3, "max": 64 } }]
            }
        })
    )]
    pub struct BasicError400Validation {
        error_code: String,
        error_description: String,
        extra_info: Option<String>,
    }

    #[derive(ToResponse)]
    #[response(
        description = "No acting user was identified on the request",
        example = json!({
            "error_code": "unauthenticated",
            "error_description": "A valid X-User-Id header is required.",
            "extra_info": null
        })
    )]
    pub struct BasicError401 {
        error_code: String,
        error_description: String,
        extra_info: Option<String>,
    }

    #[derive(ToResponse)]
    #[response(
        description = "The acting user does not own the requested entity",
        example = json!({
            "error_code": "forbidden",
            "error_description": "You don't have permission to perform this action on this project.",
            "extra_info": null
        })
    )]
    pub struct BasicError403 {
        error_code: String,
        error_description: String,
        extra_info: Option<String>,
    }

    #[derive(ToResponse)]
    #[response(
        description = "The requested entity could not be found",
        example = json!({
            "error_code": "not_found",
            "error_description": "Project not found.",
            "extra_info": null
        })
    )]
    pub struct BasicError404 {
        error_code: String,
        error_description: String,
        extra_info: Option<String>,
    }

    #[derive(ToResponse)]
    #[response(
        description = "The entity conflicts with one that already exists",
        example = json!({
            "error_code": "already_exists",
            "error_description": "Project with title 'Groceries' already exists for this user.",
            "extra_info": null
        })
    )]
    pub struct BasicError409 {
        error_code: String,
        error_description: String,
        extra_info: Option<String>,
    }

    #[derive(ToResponse)]
    #[response(
        description = "Something unexpected went wrong inside the server",
        example = json!({
            "error_code": "internal_error",
            "error_description": "Could not access data to complete your request",
            "extra_info": null
        })
    )]
    pub struct BasicError500 {
        error_code: String,
        error_description: String,
        extra_info: Option<String>,
    }
}
