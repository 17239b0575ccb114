use super::test_util::{self, send};
use axum::http::StatusCode;
use serde_json::json;

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn project_and_task_lifecycle() {
    test_util::prepare_db_and_test(|router| async move {
        let owner = test_util::create_user(&router, "owner@example.com").await;

        let (status, project) = send(
            &router,
            "POST",
            "/projects",
            Some(owner),
            Some(json!({ "title": "Groceries" })),
        )
        .await;
        assert_eq!(StatusCode::CREATED, status);
        let project_id = project["id"].as_i64().expect("project should have an id");
        let tasks_uri = format!("/projects/{project_id}/tasks");

        for text in ["Buy milk", "Buy eggs"] {
            let (status, _) = send(&router, "POST", &tasks_uri, Some(owner), Some(json!({ "text": text }))).await;
            assert_eq!(StatusCode::CREATED, status);
        }

        let (status, tasks) = send(&router, "GET", &tasks_uri, Some(owner), None).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!("Buy eggs", tasks[0]["text"]);
        assert_eq!(2, tasks[0]["priority"]);
        assert_eq!("Buy milk", tasks[1]["text"]);
        let milk_id = tasks[1]["id"].as_i64().expect("task should have an id");

        let (status, toggled) = send(
            &router,
            "POST",
            &format!("/tasks/{milk_id}/toggle"),
            Some(owner),
            Some(json!({ "completed": true })),
        )
        .await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!({ "status": "success", "completed": true }), toggled);

        let (status, stats) = send(&router, "GET", &format!("{tasks_uri}/stats"), Some(owner), None).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(2, stats["total_tasks"]);
        assert_eq!(1, stats["completed_tasks"]);
        assert_eq!(50.0, stats["completion_rate"]);

        let (status, copy) = send(
            &router,
            "POST",
            &format!("/projects/{project_id}/duplicate"),
            Some(owner),
            None,
        )
        .await;
        assert_eq!(StatusCode::CREATED, status);
        assert_eq!("Groceries (Copy)", copy["title"]);
        let copy_id = copy["id"].as_i64().expect("copy should have an id");
        let (_, copied_tasks) = send(&router, "GET", &format!("/projects/{copy_id}/tasks"), Some(owner), None).await;
        assert_eq!(2, copied_tasks.as_array().map(Vec::len).unwrap_or_default());

        let (status, found) = send(&router, "GET", "/projects/search?q=copy", Some(owner), None).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(1, found.as_array().map(Vec::len).unwrap_or_default());

        let (status, _) = send(&router, "DELETE", &format!("/projects/{project_id}"), Some(owner), None).await;
        assert_eq!(StatusCode::NO_CONTENT, status);
        let (status, body) = send(&router, "GET", &tasks_uri, Some(owner), None).await;
        assert_eq!(StatusCode::NOT_FOUND, status);
        assert_eq!("project_not_found", body["error_code"]);

        let (_, project_stats) = send(&router, "GET", "/projects/stats", Some(owner), None).await;
        assert_eq!(json!({ "total_projects": 1 }), project_stats);
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn other_users_cannot_touch_projects_or_tasks() {
    test_util::prepare_db_and_test(|router| async move {
        let owner = test_util::create_user(&router, "owner@example.com").await;
        let intruder = test_util::create_user(&router, "intruder@example.com").await;

        let (_, project) = send(&router, "POST", "/projects", Some(owner), Some(json!({ "title": "Secret" }))).await;
        let project_id = project["id"].as_i64().expect("project should have an id");
        let (_, task) = send(
            &router,
            "POST",
            &format!("/projects/{project_id}/tasks"),
            Some(owner),
            Some(json!({ "text": "Hidden", "priority": 3 })),
        )
        .await;
        let task_id = task["id"].as_i64().expect("task should have an id");

        let (status, body) = send(&router, "GET", &format!("/projects/{project_id}"), Some(intruder), None).await;
        assert_eq!(StatusCode::FORBIDDEN, status);
        assert_eq!("forbidden", body["error_code"]);

        let (status, _) = send(
            &router,
            "PATCH",
            &format!("/tasks/{task_id}"),
            Some(intruder),
            Some(json!({ "text": "Mine now" })),
        )
        .await;
        assert_eq!(StatusCode::FORBIDDEN, status);

        let (status, reorder) = send(
            &router,
            "POST",
            "/tasks/reorder",
            Some(intruder),
            Some(json!({ "projectId": project_id, "order": [{ "id": task_id, "position": 9 }] })),
        )
        .await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!({ "status": "ok", "updated": 0, "skipped": 1 }), reorder);

        let (_, listed) = send(&router, "GET", "/projects", Some(intruder), None).await;
        assert_eq!(0, listed["total"]);
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn requests_without_a_user_are_unauthenticated() {
    test_util::prepare_db_and_test(|router| async move {
        let (status, body) = send(&router, "GET", "/projects", None, None).await;
        assert_eq!(StatusCode::UNAUTHORIZED, status);
        assert_eq!("unauthenticated", body["error_code"]);
    });
}
