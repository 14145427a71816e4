use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{InputData, Job, JobStatus, VideoRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored job is unreadable: {0}")]
    Corrupt(String),
}

/// Persistence for job records. Every write after a claim is conditional on
/// the `updated_at` value the caller last saw.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Marks the job as leased, but only if its `updated_at` still equals
    /// `observed` and it is not terminal. Returns the updated row.
    async fn claim(&self, id: Uuid, observed: OffsetDateTime, now: OffsetDateTime) -> Result<Option<Job>, StoreError>;

    /// Writes every mutable field of `job` if the stored `updated_at` equals
    /// `expected`. Returns `false` when another writer got there first.
    async fn commit(&self, job: &Job, expected: OffsetDateTime) -> Result<bool, StoreError>;

    /// Inserts the permanent video record, ignoring a repeat for the same job.
    /// Fails the job without touching `input_data`, conditional on `expected`
    /// like `commit`. Used for records whose cursor cannot be read.
    async fn mark_failed(
        &self,
        id: Uuid,
        expected: OffsetDateTime,
        now: OffsetDateTime,
        error: &str,
    ) -> Result<bool, StoreError>;

    async fn record_video(&self, video: &VideoRecord) -> Result<(), StoreError>;

    /// Non-terminal jobs untouched since `idle_since`, oldest first.
    async fn list_idle(&self, idle_since: OffsetDateTime, limit: i64) -> Result<Vec<Uuid>, StoreError>;
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    status: String,
    progress: i32,
    progress_message: Option<String>,
    is_processing: bool,
    updated_at: OffsetDateTime,
    input_data: Value,
    result_data: Option<Value>,
    error: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        // A cursor this build cannot parse still yields a job, so the driver
        // can fail it instead of every read erroring.
        let (input, unreadable_input) = match serde_json::from_value::<InputData>(row.input_data) {
            Ok(input) => (input, None),
            Err(e) => (InputData::new(Vec::new(), ""), Some(e.to_string())),
        };

        Ok(Job {
            id: row.id,
            status: row.status.parse::<JobStatus>().map_err(StoreError::Corrupt)?,
            progress: row.progress,
            progress_message: row.progress_message,
            is_processing: row.is_processing,
            updated_at: row.updated_at,
            input,
            result: row.result_data,
            error: row.error,
            unreadable_input,
        })
    }
}

const JOB_COLUMNS: &str =
    "id, status, progress, progress_message, is_processing, updated_at, input_data, result_data, error";

pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobRepository {
    async fn find(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM render_jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn claim(&self, id: Uuid, observed: OffsetDateTime, now: OffsetDateTime) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE render_jobs
            SET is_processing = TRUE,
                status = 'processing',
                updated_at = $3
            WHERE id = $1
              AND updated_at = $2
              AND status IN ('pending', 'processing')
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(id)
        .bind(observed)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn commit(&self, job: &Job, expected: OffsetDateTime) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE render_jobs
            SET status = $3,
                progress = $4,
                progress_message = $5,
                is_processing = $6,
                updated_at = $7,
                input_data = $8,
                result_data = $9,
                error = $10
            WHERE id = $1 AND updated_at = $2
            "#,
        )
        .bind(job.id)
        .bind(expected)
        .bind(job.status.as_str())
        .bind(job.progress)
        .bind(&job.progress_message)
        .bind(job.is_processing)
        .bind(job.updated_at)
        .bind(Json(&job.input))
        .bind(&job.result)
        .bind(&job.error)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        expected: OffsetDateTime,
        now: OffsetDateTime,
        error: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE render_jobs
            SET status = 'failed',
                progress_message = 'Failed',
                is_processing = FALSE,
                updated_at = $3,
                error = $4
            WHERE id = $1 AND updated_at = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(now)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_video(&self, video: &VideoRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO videos (id, job_id, video_url, duration_seconds, scene_count)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (job_id) DO NOTHING
            "#,
        )
        .bind(video.id)
        .bind(video.job_id)
        .bind(&video.video_url)
        .bind(video.duration_seconds)
        .bind(video.scene_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_idle(&self, idle_since: OffsetDateTime, limit: i64) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM render_jobs
            WHERE status IN ('pending', 'processing')
              AND updated_at < $1
            ORDER BY updated_at ASC
            LIMIT $2
            "#,
        )
        .bind(idle_since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
