use serde::Deserialize;
use std::time::Duration;

use crate::common::retry::RetryPolicy;
use crate::config::env::{self, EnvKey};

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub minio_url: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    /// Public base every durable asset URL starts with, e.g. `http://cdn.local/assets`.
    pub storage_public_url: String,
    pub speech_api_url: String,
    pub speech_api_key: String,
    pub render_api_url: String,
    pub render_api_key: String,
    pub lease_ttl_secs: u64,
    pub sanitize_batch_size: usize,
    pub http_timeout_secs: u64,
    pub step_max_attempts: u32,
    pub step_retry_backoff_ms: u64,
    /// Cap on one `advance` step; clamped below the lease TTL.
    pub step_budget_secs: u64,
    pub max_asset_bytes: u64,
    /// Zero disables the recovery worker.
    pub recovery_interval_secs: u64,
    pub recovery_idle_secs: u64,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        let minio_url = env::get(EnvKey::MinioUrl)?;
        let minio_bucket = env::get(EnvKey::MinioBucket)?;
        let default_public = format!("{}/{}", minio_url.trim_end_matches('/'), minio_bucket);

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: env::get(EnvKey::DatabaseUrl)?,
            storage_public_url: env::get_or(EnvKey::StoragePublicUrl, &default_public),
            minio_url,
            minio_bucket,
            minio_access_key: env::get(EnvKey::MinioAccessKey)?,
            minio_secret_key: env::get(EnvKey::MinioSecretKey)?,
            speech_api_url: env::get(EnvKey::SpeechApiUrl)?,
            speech_api_key: env::get_or(EnvKey::SpeechApiKey, ""),
            render_api_url: env::get(EnvKey::RenderApiUrl)?,
            render_api_key: env::get_or(EnvKey::RenderApiKey, ""),
            lease_ttl_secs: env::get_parsed(EnvKey::LeaseTtlSecs, 60),
            sanitize_batch_size: env::get_parsed(EnvKey::SanitizeBatchSize, 3),
            http_timeout_secs: env::get_parsed(EnvKey::HttpTimeoutSecs, 20),
            step_max_attempts: env::get_parsed(EnvKey::StepMaxAttempts, 2),
            step_retry_backoff_ms: env::get_parsed(EnvKey::StepRetryBackoffMs, 500),
            step_budget_secs: env::get_parsed(EnvKey::StepBudgetSecs, 45),
            max_asset_bytes: env::get_parsed(EnvKey::MaxAssetBytes, 50 * 1024 * 1024),
            recovery_interval_secs: env::get_parsed(EnvKey::RecoveryIntervalSecs, 0),
            recovery_idle_secs: env::get_parsed(EnvKey::RecoveryIdleSecs, 120),
        })
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn step_budget(&self) -> Duration {
        Duration::from_secs(self.step_budget_secs).min(self.lease_ttl() * 3 / 4)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.step_max_attempts,
            Duration::from_millis(self.step_retry_backoff_ms),
        )
    }
}
