use crate::{SharedData, app_env, db, persistence, routes};
use axum::Router;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use dotenv::dotenv;
use lazy_static::lazy_static;
use rand::{Rng, thread_rng};
use serde_json::Value;
use sqlx::{Connection, PgConnection, Row};
use std::env;
use std::future::Future;
use tokio::runtime::Runtime;
use tower::ServiceExt;

lazy_static! {
    static ref TOKIO_RT: Runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Tokio runtime failed to initialize");
}

struct TestDatabase {
    template_db_name: String,
}

impl TestDatabase {
    async fn clear_old_dbs(conn: &mut PgConnection) {
        let test_dbs = sqlx::query(
            "SELECT datname FROM pg_catalog.pg_database WHERE datname LIKE 'test_db%'",
        )
        .fetch_all(&mut *conn)
        .await;
        let test_dbs: Vec<String> = match test_dbs {
            Ok(results) => results.into_iter().map(|row| row.get(0)).collect(),
            Err(error) => {
                println!(
                    "Warning: failed to list old test databases. You may need to delete them manually. Error: {error}"
                );
                return;
            }
        };

        for db in test_dbs {
            let result = sqlx::query(format!("DROP DATABASE {}", db).as_str())
                .execute(&mut *conn)
                .await;
            if result.is_err() {
                println!("Warning: failed to drop old test database {db}, you may need to do it manually.");
            }
        }
    }

    async fn create(conn: &mut PgConnection) -> Result<Self, sqlx::Error> {
        let schema_id: u32 = thread_rng().gen_range(10_000..99_999);
        let template_db_name = format!("test_db_{}", schema_id);

        sqlx::query("ALTER DATABASE postgres WITH is_template TRUE")
            .execute(&mut *conn)
            .await?;
        sqlx::query(format!("CREATE DATABASE {} TEMPLATE postgres", template_db_name).as_str())
            .execute(&mut *conn)
            .await?;

        Ok(Self { template_db_name })
    }
}

/// Creates a temp database for a test by using the "postgres" default database's content as a template,
/// migrates it, then hands the test a router wired to that database.
///
/// Expects that the TEST_DB_URL environment variable is populated
pub fn prepare_db_and_test<F, R>(test_fn: F)
where
    R: Future<Output = ()>,
    F: FnOnce(Router) -> R,
{
    if dotenv().is_err() {
        println!("Test is running without .env file.");
    }

    TOKIO_RT.block_on(async move {
        let pg_connection_base_url = env::var(app_env::test::TEST_DB_URL).expect(
            "You must provide the TEST_DB_URL environment variable as the base postgres connection string",
        );
        let mut initial_conn = PgConnection::connect(&pg_connection_base_url)
            .await
            .expect("Test failure - could not create initial connection to provision database.");
        TestDatabase::clear_old_dbs(&mut initial_conn).await;
        let test_db = match TestDatabase::create(&mut initial_conn).await {
            Ok(tdb) => tdb,
            Err(db_err) => panic!("Failed to start test database: {}", db_err),
        };
        let _ = initial_conn.close().await;

        let sqlx_pool = db::connect_sqlx(
            format!("{}/{}", pg_connection_base_url, test_db.template_db_name).as_str(),
        )
        .await
        .expect("Could not connect to the test database");
        db::migrate(&sqlx_pool)
            .await
            .expect("Could not migrate the test database");

        let router = routes::build_router(SharedData {
            ext_cxn: persistence::ExternalConnectivity::new(sqlx_pool),
        });
        test_fn(router).await;
    });
}

/// Sends a request through the router, acting as `user_id` when one is given. Returns the status
/// and the parsed JSON body, or [Value::Null] for an empty body.
pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    user_id: Option<i32>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user_id) = user_id {
        request = request.header(crate::api::auth::USER_ID_HEADER, user_id.to_string());
    }
    let request = request
        .body(match body {
            Some(json) => Body::from(json.to_string()),
            None => Body::empty(),
        })
        .expect("test request should build");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router should always produce a response");
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Could not read data from response body!");
    if bytes.is_empty() {
        return (status, Value::Null);
    }

    let parsed = serde_json::from_slice(&bytes).unwrap_or_else(|err| {
        panic!("Response was not JSON! Error: {err}, Received body: {bytes:?}")
    });
    (status, parsed)
}

/// Creates a user through the API and returns its ID
pub async fn create_user(router: &Router, email: &str) -> i32 {
    let (status, body) = send(
        router,
        "POST",
        "/users",
        None,
        Some(serde_json::json!({ "email": email, "display_name": "Tester" })),
    )
    .await;
    assert_eq!(StatusCode::CREATED, status, "user creation failed: {body}");

    body["id"].as_i64().expect("created user should have an id") as i32
}
