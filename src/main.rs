use anyhow::Context;
use axum::extract::State;
use dotenv::dotenv;
use std::env;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

mod api;
mod app_env;
mod db;
mod domain;
mod dto;
mod external_connections;
mod logging;
mod persistence;
mod routes;
mod routing_utils;

/// Data shared by every request handler
pub struct SharedData {
    pub ext_cxn: persistence::ExternalConnectivity,
}

/// Extractor type for the application's shared state
pub type AppState = State<Arc<SharedData>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        println!("Starting server without .env file.");
    }

    let env_filter = logging::init_env_filter()?;
    let otel_exporters = match (
        env::var(app_env::OTEL_SPAN_EXPORT_URL),
        env::var(app_env::OTEL_METRIC_EXPORT_URL),
    ) {
        (Ok(span_url), Ok(metric_url)) => Some(logging::init_exporters(&span_url, &metric_url)?),
        _ => None,
    };
    logging::setup_logging_and_tracing(env_filter, otel_exporters);

    let db_url = env::var(app_env::DB_URL)
        .with_context(|| format!("{} must be set to the database's connection string", app_env::DB_URL))?;
    let sqlx_pool = db::connect_sqlx(&db_url).await?;
    db::migrate(&sqlx_pool).await?;

    let shared_data = SharedData {
        ext_cxn: persistence::ExternalConnectivity::new(sqlx_pool),
    };
    let router = routes::build_router(shared_data);

    let listen_addr = env::var(app_env::LISTEN_ADDR)
        .unwrap_or_else(|_| app_env::DEFAULT_LISTEN_ADDR.to_owned());
    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Could not bind to {listen_addr}"))?;

    info!("Server listening on {listen_addr}");
    axum::serve(listener, router)
        .await
        .context("Server exited unexpectedly")
}
