use crate::routing_utils::BasicErrorResponse;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use tracing::{Span, debug};

/// Header carrying the ID of the user the upstream auth layer logged in
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user a request acts on behalf of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub i32);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|raw| raw.to_str().ok())
            .and_then(|raw| raw.trim().parse::<i32>().ok());

        let Some(user_id) = user_id else {
            debug!("Rejected request without a usable {USER_ID_HEADER} header");
            return Err((
                StatusCode::UNAUTHORIZED,
                axum::Json(BasicErrorResponse::new(
                    "unauthenticated",
                    "A valid X-User-Id header is required.",
                )),
            )
                .into_response());
        };

        Span::current().record("user_id", user_id);
        Ok(AuthenticatedUser(user_id))
    }
}
