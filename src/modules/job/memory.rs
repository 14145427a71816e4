use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{Job, JobStatus, VideoRecord};
use super::repository::{JobStore, StoreError};

/// In-memory `JobStore` with the same conditional-write rules as Postgres.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
    videos: Mutex<Vec<VideoRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) {
        self.jobs.lock().unwrap().insert(job.id, job);
    }

    pub fn get(&self, id: Uuid) -> Job {
        self.jobs.lock().unwrap().get(&id).cloned().expect("job exists")
    }

    pub fn videos(&self) -> Vec<VideoRecord> {
        self.videos.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn find(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.lock().unwrap().get(&id).cloned())
    }

    async fn claim(&self, id: Uuid, observed: OffsetDateTime, now: OffsetDateTime) -> Result<Option<Job>, StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(&id) {
            Some(job) if job.updated_at == observed && !job.status.is_terminal() => {
                job.is_processing = true;
                job.status = JobStatus::Processing;
                job.updated_at = now;
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn commit(&self, job: &Job, expected: OffsetDateTime) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(&job.id) {
            Some(stored) if stored.updated_at == expected => {
                *stored = job.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        expected: OffsetDateTime,
        now: OffsetDateTime,
        error: &str,
    ) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(&id) {
            Some(stored) if stored.updated_at == expected => {
                stored.fail(error);
                stored.is_processing = false;
                stored.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_video(&self, video: &VideoRecord) -> Result<(), StoreError> {
        let mut videos = self.videos.lock().unwrap();
        if !videos.iter().any(|v| v.job_id == video.job_id) {
            videos.push(video.clone());
        }
        Ok(())
    }

    async fn list_idle(&self, idle_since: OffsetDateTime, limit: i64) -> Result<Vec<Uuid>, StoreError> {
        let jobs = self.jobs.lock().unwrap();
        let mut idle: Vec<&Job> = jobs
            .values()
            .filter(|j| !j.status.is_terminal() && j.updated_at < idle_since)
            .collect();
        idle.sort_by_key(|j| j.updated_at);
        Ok(idle.into_iter().take(limit.max(0) as usize).map(|j| j.id).collect())
    }
}
