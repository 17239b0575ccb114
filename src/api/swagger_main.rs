use crate::dto;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(info(
    title = "Taskboard API",
    description = "Multi-user to-do lists organized into projects. Requests act on behalf of the user named in the X-User-Id header."
))]
struct TaskboardApi;

/// Constructs the route on the API that renders the swagger UI and returns the OpenAPI schema.
/// Merges in OpenAPI definitions from other locations in the app, such as the [dto] package
/// and submodules of [api][crate::api]
pub fn build_documentation() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_docs())
}

fn api_docs() -> utoipa::openapi::OpenApi {
    let mut api_docs = TaskboardApi::openapi();
    api_docs.merge(dto::OpenApiSchemas::openapi());
    api_docs.merge(super::user::UsersApi::openapi());
    api_docs.merge(super::project::ProjectApi::openapi());
    api_docs.merge(super::task::TaskApi::openapi());

    api_docs
}
