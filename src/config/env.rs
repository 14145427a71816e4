use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    MinioUrl,
    MinioBucket,
    MinioAccessKey,
    MinioSecretKey,
    StoragePublicUrl,
    SpeechApiUrl,
    SpeechApiKey,
    RenderApiUrl,
    RenderApiKey,
    LeaseTtlSecs,
    SanitizeBatchSize,
    HttpTimeoutSecs,
    StepMaxAttempts,
    StepRetryBackoffMs,
    StepBudgetSecs,
    MaxAssetBytes,
    RecoveryIntervalSecs,
    RecoveryIdleSecs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioBucket => "MINIO_BUCKET_ASSETS",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::StoragePublicUrl => "STORAGE_PUBLIC_URL",
            EnvKey::SpeechApiUrl => "SPEECH_API_URL",
            EnvKey::SpeechApiKey => "SPEECH_API_KEY",
            EnvKey::RenderApiUrl => "RENDER_API_URL",
            EnvKey::RenderApiKey => "RENDER_API_KEY",
            EnvKey::LeaseTtlSecs => "LEASE_TTL_SECS",
            EnvKey::SanitizeBatchSize => "SANITIZE_BATCH_SIZE",
            EnvKey::HttpTimeoutSecs => "HTTP_TIMEOUT_SECS",
            EnvKey::StepMaxAttempts => "STEP_MAX_ATTEMPTS",
            EnvKey::StepRetryBackoffMs => "STEP_RETRY_BACKOFF_MS",
            EnvKey::StepBudgetSecs => "STEP_BUDGET_SECS",
            EnvKey::MaxAssetBytes => "MAX_ASSET_BYTES",
            EnvKey::RecoveryIntervalSecs => "RECOVERY_INTERVAL_SECS",
            EnvKey::RecoveryIdleSecs => "RECOVERY_IDLE_SECS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
