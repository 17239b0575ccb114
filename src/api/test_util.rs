use axum::body;
use axum::response::{ErrorResponse, IntoResponse, Response};
use serde::de::DeserializeOwned;

/// Used in tests to both extract the raw bytes from the HTTP response body and then deserialize them into the
/// requested type. Will panic and fail the test if either step fails somehow.
pub async fn deserialize_body<T: DeserializeOwned>(response_body: body::Body) -> T {
    let bytes = body::to_bytes(response_body, usize::MAX)
        .await
        .expect("Could not read data from response body!");

    serde_json::from_slice(&bytes).unwrap_or_else(|err| {
        panic!(
            "Could not parse body content into data structure! Error: {}, Received body: {:?}",
            err, bytes
        )
    })
}

/// Unwraps a handler's error response, failing the test if the handler succeeded
pub fn expect_error_response<T>(result: Result<T, ErrorResponse>) -> Response {
    match result {
        Ok(_) => panic!("Expected an error response, but the handler succeeded"),
        Err(err) => Err::<(), _>(err).into_response(),
    }
}

/// Returns the status and `error_code` of an error response
pub async fn error_code_of(response: Response) -> (axum::http::StatusCode, String) {
    let status = response.status();
    let body: serde_json::Value = deserialize_body(response.into_body()).await;
    let code = body["error_code"]
        .as_str()
        .unwrap_or_else(|| panic!("Error body had no error_code: {body}"))
        .to_owned();

    (status, code)
}
