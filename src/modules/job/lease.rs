//! TTL-bounded soft lock on a job record.
//!
//! The lease is a compare-and-swap on `updated_at`: the claim only succeeds
//! against the row the caller read, and the value it writes becomes the token
//! every later write of the invocation is conditional on.

use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::warn;

use super::error::JobError;
use super::model::Job;
use super::repository::JobStore;

/// Current time at Postgres precision, strictly after `after`.
pub fn next_stamp(after: OffsetDateTime) -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    let now = now.replace_microsecond(now.microsecond()).unwrap_or(now);
    if now > after {
        now
    } else {
        after + time::Duration::microseconds(1)
    }
}

pub struct LeaseManager {
    store: Arc<dyn JobStore>,
    ttl: Duration,
}

impl LeaseManager {
    pub fn new(store: Arc<dyn JobStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// A lease is live while its holder touched the record within the TTL.
    pub fn is_held(&self, job: &Job, now: OffsetDateTime) -> bool {
        job.is_processing && now - job.updated_at < self.ttl
    }

    /// Claims `job` as observed. Returns the leased record as written.
    pub async fn acquire(&self, job: &Job) -> Result<Job, JobError> {
        let now = next_stamp(job.updated_at);
        if self.is_held(job, now) {
            return Err(JobError::LeaseContention);
        }
        if job.is_processing {
            warn!(job_id = %job.id, "Reclaiming expired lease");
        }

        self.store
            .claim(job.id, job.updated_at, now)
            .await?
            .ok_or(JobError::LeaseContention)
    }

    /// Persists `job` conditionally on its current token and moves the token
    /// forward. `Ok(false)` means the lease was lost and nothing was written.
    pub async fn commit(&self, job: &mut Job) -> Result<bool, JobError> {
        let token = job.updated_at;
        job.updated_at = next_stamp(token);
        let written = self.store.commit(job, token).await?;
        if !written {
            job.updated_at = token;
            warn!(job_id = %job.id, "Lease lost before commit");
        }
        Ok(written)
    }

    /// Clears the lease flag and persists.
    pub async fn release(&self, job: &mut Job) -> Result<bool, JobError> {
        job.is_processing = false;
        self.commit(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::job::memory::MemoryJobStore;
    use crate::modules::job::model::{InputData, JobStatus, SceneInput};
    use assert_matches::assert_matches;
    use uuid::Uuid;

    fn job(updated_at: OffsetDateTime, is_processing: bool) -> Job {
        let input = InputData::new(
            vec![SceneInput { text: "Hi".into(), asset_url: "https://x.test/a.png".into() }],
            "nova",
        );
        let mut job = Job::new(Uuid::new_v4(), input, updated_at);
        job.is_processing = is_processing;
        job
    }

    fn setup(job: &Job) -> (Arc<MemoryJobStore>, LeaseManager) {
        let store = Arc::new(MemoryJobStore::new());
        store.insert(job.clone());
        let lease = LeaseManager::new(store.clone(), Duration::from_secs(60));
        (store, lease)
    }

    #[test]
    fn stamps_are_microsecond_precise_and_move_forward() {
        let future = OffsetDateTime::now_utc() + time::Duration::hours(1);
        let stamp = next_stamp(future);
        assert!(stamp > future);
        assert_eq!(stamp.nanosecond() % 1_000, future.nanosecond() % 1_000);

        let past = OffsetDateTime::UNIX_EPOCH;
        assert_eq!(next_stamp(past).nanosecond() % 1_000, 0);
    }

    #[tokio::test]
    async fn acquire_marks_job_processing() {
        let idle = job(OffsetDateTime::now_utc() - time::Duration::seconds(5), false);
        let (store, lease) = setup(&idle);

        let leased = lease.acquire(&idle).await.unwrap();

        assert!(leased.is_processing);
        assert_eq!(leased.status, JobStatus::Processing);
        assert!(leased.updated_at > idle.updated_at);
        assert_eq!(store.get(idle.id), leased);
    }

    #[tokio::test]
    async fn fresh_lease_blocks_acquisition() {
        let busy = job(OffsetDateTime::now_utc(), true);
        let (_, lease) = setup(&busy);

        assert_matches!(lease.acquire(&busy).await, Err(JobError::LeaseContention));
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimed() {
        let stale = job(OffsetDateTime::now_utc() - time::Duration::seconds(61), true);
        let (_, lease) = setup(&stale);

        let leased = lease.acquire(&stale).await.unwrap();
        assert!(leased.is_processing);
    }

    #[tokio::test]
    async fn only_one_claim_wins_against_the_same_observation() {
        let idle = job(OffsetDateTime::now_utc() - time::Duration::seconds(5), false);
        let (_, lease) = setup(&idle);

        assert!(lease.acquire(&idle).await.is_ok());
        assert_matches!(lease.acquire(&idle).await, Err(JobError::LeaseContention));
    }

    #[tokio::test]
    async fn commit_after_takeover_reports_lost_lease() {
        let idle = job(OffsetDateTime::now_utc() - time::Duration::seconds(5), false);
        let (store, lease) = setup(&idle);
        let mut mine = lease.acquire(&idle).await.unwrap();

        let mut theirs = store.get(idle.id);
        theirs.progress = 50;
        assert!(lease.commit(&mut theirs).await.unwrap());

        mine.progress = 20;
        assert!(!lease.release(&mut mine).await.unwrap());
        assert_eq!(store.get(idle.id).progress, 50);
    }

    #[tokio::test]
    async fn release_clears_flag() {
        let idle = job(OffsetDateTime::now_utc() - time::Duration::seconds(5), false);
        let (store, lease) = setup(&idle);
        let mut leased = lease.acquire(&idle).await.unwrap();

        assert!(lease.release(&mut leased).await.unwrap());
        assert!(!store.get(idle.id).is_processing);
    }
}
