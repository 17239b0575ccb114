use crate::{SharedData, api, logging};
use axum::Router;
use std::sync::Arc;

/// Assembles every route group, the swagger UI, and the HTTP tracing layer into the
/// application's router
pub fn build_router(shared_data: SharedData) -> Router {
    let router = Router::new()
        .nest("/users", api::user::user_routes())
        .nest("/projects", api::project::project_routes())
        .merge(api::task::task_routes())
        .merge(api::swagger_main::build_documentation())
        .with_state(Arc::new(shared_data));

    logging::attach_tracing_http(router)
}
