use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::{connect_to_db, run_migrations};
use crate::infrastructure::render::client::RenderApi;
use crate::infrastructure::speech::client::SpeechApi;
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::job::driver::{DriverSettings, JobDriver};
use crate::modules::job::repository::{JobStore, PgJobRepository};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("scenereel=info,tower_http=info")),
        )
        .init();

    info!("Starting server...");

    let config = AppConfig::new().context("Missing required environment variable")?;

    let pool = connect_to_db(&config.database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    run_migrations(&pool).await.context("Failed to run migrations")?;

    let storage = StorageService::new(
        &config.minio_url,
        &config.minio_bucket,
        &config.minio_access_key,
        &config.minio_secret_key,
        &config.storage_public_url,
    )
    .await?;

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let speech = SpeechApi::with_client(
        http.clone(),
        config.speech_api_url.clone(),
        config.speech_api_key.clone(),
    );
    let render = RenderApi::with_client(
        http.clone(),
        config.render_api_url.clone(),
        config.render_api_key.clone(),
    );

    let jobs: Arc<dyn JobStore> = Arc::new(PgJobRepository::new(pool));
    let driver = JobDriver::new(
        jobs.clone(),
        Arc::new(storage),
        Arc::new(speech),
        Arc::new(render),
        http,
        DriverSettings {
            lease_ttl: config.lease_ttl(),
            step_budget: config.step_budget(),
            sanitize_batch: config.sanitize_batch_size,
            max_asset_bytes: config.max_asset_bytes,
            retry: config.retry_policy(),
        },
    );
    let state = AppState::new(jobs, Arc::new(driver));

    if config.recovery_interval_secs > 0 {
        tokio::spawn(workers::recovery::start_recovery_worker(
            state.clone(),
            Duration::from_secs(config.recovery_interval_secs),
            Duration::from_secs(config.recovery_idle_secs),
        ));
    }

    let app = app::create_app(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
