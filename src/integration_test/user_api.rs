use super::test_util::{self, send};
use axum::http::StatusCode;
use serde_json::json;

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn can_create_and_list_users() {
    test_util::prepare_db_and_test(|router| async move {
        let user_id = test_util::create_user(&router, "evan@example.com").await;

        let (status, users) = send(&router, "GET", "/users", None, None).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!([{ "id": user_id, "email": "evan@example.com", "display_name": "Tester" }]), users);
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn duplicate_email_is_rejected() {
    test_util::prepare_db_and_test(|router| async move {
        test_util::create_user(&router, "evan@example.com").await;

        let (status, body) = send(
            &router,
            "POST",
            "/users",
            None,
            Some(json!({ "email": "evan@example.com", "display_name": "Other" })),
        )
        .await;
        assert_eq!(StatusCode::CONFLICT, status);
        assert_eq!("already_exists", body["error_code"]);
    });
}
