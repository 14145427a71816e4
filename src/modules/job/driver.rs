//! One unit of work per call.
//!
//! `advance` loads the job, takes the lease, runs exactly one step chosen from
//! the cursor stage, persists and releases. Callers keep calling until the job
//! is terminal.

use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::cursor::{CursorError, JobCursor, Stage};
use super::error::JobError;
use super::lease::{LeaseManager, next_stamp};
use super::model::{Job, JobResult, JobStatus, PendingRender, VideoRecord};
use super::normalizer::AssetNormalizer;
use super::repository::JobStore;
use super::synthesizer::SceneSynthesizer;
use crate::common::retry::RetryPolicy;
use crate::infrastructure::render::{RenderClient, RenderState};
use crate::infrastructure::speech::SpeechSynthesizer;
use crate::infrastructure::storage::ObjectStore;
use crate::modules::composition;

const PROGRESS_SCENES_START: usize = 10;
const PROGRESS_SCENES_SPAN: usize = 70;
const PROGRESS_SANITIZING: i32 = 82;
const PROGRESS_RENDER_SUBMITTED: i32 = 85;
const PROGRESS_RENDERING: i32 = 90;

#[derive(Clone, Debug)]
pub struct DriverSettings {
    pub lease_ttl: Duration,
    /// Wall-clock cap on one step, retries included. Never more than three
    /// quarters of `lease_ttl`.
    pub step_budget: Duration,
    /// Collected assets normalized per sanitation step.
    pub sanitize_batch: usize,
    pub max_asset_bytes: u64,
    pub retry: RetryPolicy,
}

/// What a single `advance` call did.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Another caller holds the lease, or took it over mid-step.
    Skipped,
    Processed { scene_index: usize },
    Sanitized { count: usize },
    Rendering { render_id: String },
    StillRendering { status: String },
    Completed { video_url: String },
    Failed { error: String },
}

pub struct JobDriver {
    store: Arc<dyn JobStore>,
    lease: LeaseManager,
    normalizer: Arc<AssetNormalizer>,
    synthesizer: SceneSynthesizer,
    render: Arc<dyn RenderClient>,
    settings: DriverSettings,
}

impl JobDriver {
    pub fn new(
        store: Arc<dyn JobStore>,
        objects: Arc<dyn ObjectStore>,
        speech: Arc<dyn SpeechSynthesizer>,
        render: Arc<dyn RenderClient>,
        http: reqwest::Client,
        mut settings: DriverSettings,
    ) -> Self {
        settings.step_budget = settings.step_budget.min(settings.lease_ttl * 3 / 4);
        let normalizer = Arc::new(AssetNormalizer::new(objects, http, settings.max_asset_bytes));
        Self {
            lease: LeaseManager::new(store.clone(), settings.lease_ttl),
            synthesizer: SceneSynthesizer::new(normalizer.clone(), speech, settings.retry),
            store,
            normalizer,
            render,
            settings,
        }
    }

    pub async fn advance(&self, id: Uuid) -> Result<Advance, JobError> {
        let job = self.store.find(id).await?.ok_or(JobError::NotFound(id))?;

        if let Some(reply) = terminal_reply(&job) {
            return Ok(reply);
        }
        if let Some(reason) = job.unreadable_input.clone() {
            return self.fail_unreadable(&job, reason).await;
        }
        if let Some(message) = job.input.validation_message() {
            return self.reject(job, message).await;
        }

        let mut job = match self.lease.acquire(&job).await {
            Ok(leased) => leased,
            Err(JobError::LeaseContention) => {
                warn!(job_id = %id, "Job is leased by another caller, skipping");
                return Ok(Advance::Skipped);
            }
            Err(e) => return Err(e),
        };

        let budget = self.settings.step_budget;
        let stepped = match timeout(budget, self.step(&mut job)).await {
            Ok(stepped) => stepped,
            Err(_) => Err(JobError::StepTimeout(budget)),
        };

        match stepped {
            Ok(outcome) => {
                if !self.lease.release(&mut job).await? {
                    return Ok(Advance::Skipped);
                }
                info!(job_id = %id, ?outcome, progress = job.progress, "Job advanced");
                Ok(outcome)
            }
            Err(e) => {
                if !self.abort(job, &e).await {
                    return Ok(Advance::Skipped);
                }
                Err(e)
            }
        }
    }

    /// Fails a job whose stored cursor does not parse. The stored input is
    /// left as it was for whichever build wrote it.
    async fn fail_unreadable(&self, job: &Job, reason: String) -> Result<Advance, JobError> {
        let now = next_stamp(job.updated_at);
        if self.lease.is_held(job, now) {
            return Ok(Advance::Skipped);
        }

        let err = JobError::CorruptCursor(CursorError::Unreadable(reason));
        error!(job_id = %job.id, error = %err, "Job failed");
        if !self.store.mark_failed(job.id, job.updated_at, now, &err.to_string()).await? {
            warn!(job_id = %job.id, "Job changed before it could be failed");
            return Ok(Advance::Skipped);
        }
        Err(err)
    }

    /// Fails a job whose input can never succeed. Written against the record
    /// as read, without taking the lease.
    async fn reject(&self, mut job: Job, message: String) -> Result<Advance, JobError> {
        let error = JobError::Validation(message).to_string();
        warn!(job_id = %job.id, %error, "Rejecting invalid job");
        job.fail(error.clone());
        if !self.lease.commit(&mut job).await? {
            return Ok(Advance::Skipped);
        }
        Ok(Advance::Failed { error })
    }

    /// Records a step error on the job and drops the lease. Returns `false`
    /// when the lease was already lost and nothing was written.
    async fn abort(&self, mut job: Job, err: &JobError) -> bool {
        if err.is_fatal() {
            error!(job_id = %job.id, error = %err, "Job failed");
            job.fail(err.to_string());
        } else {
            warn!(job_id = %job.id, error = %err, "Step interrupted, releasing lease");
        }
        match self.lease.release(&mut job).await {
            Ok(written) => written,
            Err(release_err) => {
                error!(job_id = %job.id, error = %release_err, "Could not release lease");
                true
            }
        }
    }

    async fn step(&self, job: &mut Job) -> Result<Advance, JobError> {
        let is_durable = |url: &str| self.normalizer.is_durable(url);
        let mut cursor = JobCursor::restore(job.status, &job.input, is_durable)?;

        let outcome = match cursor.stage().clone() {
            Stage::AwaitingRenderCompletion(pending) => self.poll_render(job, &mut cursor, &pending).await?,
            Stage::AwaitingScenes => self.process_scene(job, &mut cursor).await?,
            Stage::AwaitingSanitation => self.sanitize(job, &mut cursor).await?,
            Stage::AwaitingRenderSubmission => self.submit_render(job, &mut cursor).await?,
            Stage::Done => return Ok(terminal_reply(job).unwrap_or(Advance::Skipped)),
        };

        cursor.write_into(&mut job.input);
        Ok(outcome)
    }

    async fn poll_render(
        &self,
        job: &mut Job,
        cursor: &mut JobCursor,
        pending: &PendingRender,
    ) -> Result<Advance, JobError> {
        let state = self
            .settings
            .retry
            .run("render poll", || self.render.poll(&pending.render_id))
            .await
            .map_err(JobError::RenderPoll)?;

        match state {
            RenderState::Running { status } => {
                job.set_progress(PROGRESS_RENDERING, format!("Rendering video ({})", status));
                Ok(Advance::StillRendering { status })
            }
            RenderState::Completed { video_url } => {
                let payload = composition::build(cursor.processed(), &job.input.render_options());
                let result = JobResult {
                    video_url: video_url.clone(),
                    render_id: pending.render_id.clone(),
                    duration: payload.duration,
                    scene_count: cursor.processed().len(),
                    assets: cursor.assets(),
                };

                self.store
                    .record_video(&VideoRecord {
                        id: Uuid::new_v4(),
                        job_id: job.id,
                        video_url: video_url.clone(),
                        duration_seconds: result.duration,
                        scene_count: i32::try_from(result.scene_count).unwrap_or(i32::MAX),
                    })
                    .await?;

                cursor.finish();
                job.complete(&result);
                info!(job_id = %job.id, render_id = %pending.render_id, %video_url, "Render completed");
                Ok(Advance::Completed { video_url })
            }
            RenderState::Failed { reason } => {
                let error = JobError::RenderFailure(reason).to_string();
                cursor.finish();
                job.fail(error.clone());
                warn!(job_id = %job.id, render_id = %pending.render_id, %error, "Render failed");
                Ok(Advance::Failed { error })
            }
        }
    }

    async fn process_scene(&self, job: &mut Job, cursor: &mut JobCursor) -> Result<Advance, JobError> {
        let index = cursor.current_scene_index();
        let total = cursor.total_scenes();
        let input = job.input.scenes[index].clone();

        let scene = self
            .synthesizer
            .synthesize(job.id, index, &input, &job.input.voice_id)
            .await?;
        cursor.record_scene(scene, &input.asset_url, |url| self.normalizer.is_durable(url))?;

        let done = index + 1;
        let progress = PROGRESS_SCENES_START + PROGRESS_SCENES_SPAN * done / total;
        job.set_progress(progress as i32, format!("Processed scene {} of {}", done, total));
        Ok(Advance::Processed { scene_index: index })
    }

    async fn sanitize(&self, job: &mut Job, cursor: &mut JobCursor) -> Result<Advance, JobError> {
        let is_durable = |url: &str| self.normalizer.is_durable(url);
        let batch = cursor.pending_assets(is_durable, self.settings.sanitize_batch.max(1));

        for (position, reference) in &batch {
            let slot = format!("asset-{}", position);
            let durable = self
                .settings
                .retry
                .run("asset sanitation", || self.normalizer.normalize(reference, job.id, &slot))
                .await
                .map_err(|e| JobError::SanitationBatch(format!("{}: {}", slot, e)))?;
            cursor.replace_asset(*position, durable)?;
        }
        cursor.refresh(is_durable);

        let remaining = cursor.count_pending_assets(is_durable);
        job.set_progress(PROGRESS_SANITIZING, format!("Preparing assets ({} remaining)", remaining));
        Ok(Advance::Sanitized { count: batch.len() })
    }

    async fn submit_render(&self, job: &mut Job, cursor: &mut JobCursor) -> Result<Advance, JobError> {
        let payload = composition::build(cursor.processed(), &job.input.render_options());
        let render_id = self
            .settings
            .retry
            .run("render submission", || self.render.submit(&payload))
            .await
            .map_err(JobError::RenderSubmission)?;

        cursor.begin_render(PendingRender {
            render_id: render_id.clone(),
            started_at: OffsetDateTime::now_utc(),
        })?;
        job.set_progress(PROGRESS_RENDER_SUBMITTED, "Rendering video");
        info!(job_id = %job.id, %render_id, scenes = payload.scenes.len(), "Render submitted");
        Ok(Advance::Rendering { render_id })
    }
}

/// The reply for a job that has already finished.
pub fn terminal_reply(job: &Job) -> Option<Advance> {
    match job.status {
        JobStatus::Completed => Some(Advance::Completed {
            video_url: job.video_url().unwrap_or_default().to_string(),
        }),
        JobStatus::Failed => Some(Advance::Failed {
            error: job.error.clone().unwrap_or_else(|| "Job failed".to_string()),
        }),
        JobStatus::Pending | JobStatus::Processing => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::render::RenderError;
    use crate::infrastructure::storage::memory::{MemoryStore, TEST_PUBLIC_BASE};
    use crate::modules::job::fakes::{FakeRender, FakeSpeech, Gate};
    use crate::modules::job::memory::MemoryJobStore;
    use crate::modules::job::model::{InputData, SceneInput};
    use assert_matches::assert_matches;
    use serde_json::json;

    struct Harness {
        jobs: Arc<MemoryJobStore>,
        objects: Arc<MemoryStore>,
        speech: Arc<FakeSpeech>,
        render: Arc<FakeRender>,
        driver: JobDriver,
    }

    fn settings() -> DriverSettings {
        DriverSettings {
            lease_ttl: Duration::from_secs(60),
            step_budget: Duration::from_secs(45),
            sanitize_batch: 3,
            max_asset_bytes: 1 << 20,
            retry: RetryPolicy::no_retry(),
        }
    }

    fn harness_with(speech: FakeSpeech, render: FakeRender, settings: DriverSettings) -> Harness {
        let jobs = Arc::new(MemoryJobStore::new());
        let objects = Arc::new(MemoryStore::new());
        let speech = Arc::new(speech);
        let render = Arc::new(render);
        let driver = JobDriver::new(
            jobs.clone(),
            objects.clone(),
            speech.clone(),
            render.clone(),
            reqwest::Client::new(),
            settings,
        );
        Harness { jobs, objects, speech, render, driver }
    }

    fn harness() -> Harness {
        harness_with(FakeSpeech::new(), FakeRender::new(), settings())
    }

    const SCENE_IMAGE: &str = "data:image/png;base64,iVBORw0KGgo=";

    fn job_with(scene_count: usize) -> Job {
        let scenes = (0..scene_count)
            .map(|i| SceneInput { text: format!("Scene {} narration", i), asset_url: SCENE_IMAGE.into() })
            .collect();
        Job::new(
            Uuid::new_v4(),
            InputData::new(scenes, "nova"),
            OffsetDateTime::now_utc() - time::Duration::seconds(5),
        )
    }

    impl Harness {
        fn insert(&self, job: Job) -> Uuid {
            let id = job.id;
            self.jobs.insert(job);
            id
        }

        async fn advance_n(&self, id: Uuid, n: usize) -> Vec<Advance> {
            let mut outcomes = Vec::new();
            for _ in 0..n {
                outcomes.push(self.driver.advance(id).await.unwrap());
            }
            outcomes
        }
    }

    #[tokio::test]
    async fn first_advance_processes_scene_zero() {
        let h = harness();
        let id = h.insert(job_with(3));

        let outcome = h.driver.advance(id).await.unwrap();

        assert_eq!(outcome, Advance::Processed { scene_index: 0 });
        let job = h.jobs.get(id);
        assert_eq!(job.status, JobStatus::Processing);
        assert!(!job.is_processing);
        assert_eq!(job.input.processed_scenes.len(), 1);
        assert_eq!(job.input.current_scene_index, 1);
        assert_eq!(job.progress, 33);
        assert_eq!(job.progress_message.as_deref(), Some("Processed scene 1 of 3"));
        assert!(job.input.processed_scenes[0].asset_url.starts_with(TEST_PUBLIC_BASE));
        assert_eq!(h.speech.calls(), vec!["Scene 0 narration".to_string()]);
    }

    #[tokio::test]
    async fn fourth_advance_submits_the_render() {
        let h = harness();
        let id = h.insert(job_with(3));

        let outcomes = h.advance_n(id, 4).await;

        assert_eq!(
            outcomes,
            vec![
                Advance::Processed { scene_index: 0 },
                Advance::Processed { scene_index: 1 },
                Advance::Processed { scene_index: 2 },
                Advance::Rendering { render_id: "render-1".into() },
            ]
        );
        let job = h.jobs.get(id);
        let indices: Vec<usize> = job.input.processed_scenes.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(job.input.current_scene_index, 3);
        assert_eq!(job.input.pending_render.as_ref().map(|p| p.render_id.as_str()), Some("render-1"));
        assert_eq!(job.progress, 85);
        assert_eq!(job.progress_message.as_deref(), Some("Rendering video"));

        let submitted = h.render.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].scenes.len(), 3);
        assert_eq!(submitted[0].output.width, 1080);
        assert_eq!(submitted[0].output.height, 1920);
    }

    #[tokio::test]
    async fn completed_render_finishes_the_job() {
        let h = harness();
        let id = h.insert(job_with(2));
        h.advance_n(id, 3).await;
        h.render.push_poll(Ok(RenderState::Completed { video_url: "https://cdn.test/final.mp4".into() }));

        let outcome = h.driver.advance(id).await.unwrap();

        assert_eq!(outcome, Advance::Completed { video_url: "https://cdn.test/final.mp4".into() });
        let job = h.jobs.get(id);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.progress_message.as_deref(), Some("Video ready"));
        assert!(job.input.pending_render.is_none());
        assert!(!job.is_processing);

        let result = job.result.unwrap();
        assert_eq!(result["videoUrl"], json!("https://cdn.test/final.mp4"));
        assert_eq!(result["renderId"], json!("render-1"));
        assert_eq!(result["sceneCount"], json!(2));
        // Fake clips last 2.5s and 3.0s.
        assert_eq!(result["duration"], json!(5.5));

        let videos = h.jobs.videos();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].job_id, id);
        assert_eq!(videos[0].scene_count, 2);
    }

    #[tokio::test]
    async fn render_failure_fails_the_job_with_upstream_status() {
        let h = harness();
        let id = h.insert(job_with(1));
        h.advance_n(id, 2).await;
        h.render.push_poll(Ok(RenderState::Failed { reason: "encoding_error".into() }));

        let outcome = h.driver.advance(id).await.unwrap();

        assert_eq!(outcome, Advance::Failed { error: "encoding_error".into() });
        let job = h.jobs.get(id);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("encoding_error"));
        assert!(job.input.pending_render.is_none());
        assert!(!job.is_processing);
    }

    #[tokio::test]
    async fn running_render_reports_status_and_keeps_handle() {
        let h = harness();
        let id = h.insert(job_with(1));
        h.advance_n(id, 2).await;

        let outcome = h.driver.advance(id).await.unwrap();

        assert_eq!(outcome, Advance::StillRendering { status: "rendering".into() });
        let job = h.jobs.get(id);
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress, 90);
        assert_eq!(job.progress_message.as_deref(), Some("Rendering video (rendering)"));
        assert!(job.input.pending_render.is_some());
        assert!(job.error.is_none());
    }

    #[tokio::test]
    async fn zero_scenes_fail_without_taking_the_lease() {
        let h = harness();
        let mut job = job_with(0);
        job.input.extra.insert("source".into(), json!("import"));
        let id = h.insert(job);

        let outcome = h.driver.advance(id).await.unwrap();

        assert_matches!(outcome, Advance::Failed { ref error } if error.contains("at least one scene is required"));
        let job = h.jobs.get(id);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(!job.is_processing);
        assert_eq!(job.input.extra.get("source"), Some(&json!("import")));
        assert!(h.speech.calls().is_empty());
    }

    #[tokio::test]
    async fn concurrent_advances_do_the_work_once() {
        let gate = Arc::new(Gate::default());
        let h = harness_with(FakeSpeech::gated(gate.clone()), FakeRender::new(), settings());
        let id = h.insert(job_with(2));

        let (first, second) = tokio::join!(h.driver.advance(id), async {
            gate.entered.notified().await;
            let outcome = h.driver.advance(id).await;
            gate.release.notify_one();
            outcome
        });

        assert_eq!(first.unwrap(), Advance::Processed { scene_index: 0 });
        assert_eq!(second.unwrap(), Advance::Skipped);
        assert_eq!(h.speech.calls().len(), 1);
        assert_eq!(h.jobs.get(id).input.current_scene_index, 1);
    }

    #[tokio::test]
    async fn takeover_during_a_step_turns_into_skip() {
        let gate = Arc::new(Gate::default());
        let h = harness_with(FakeSpeech::gated(gate.clone()), FakeRender::new(), settings());
        let id = h.insert(job_with(2));

        let (outcome, _) = tokio::join!(h.driver.advance(id), async {
            gate.entered.notified().await;
            let mut other = h.jobs.get(id);
            other.updated_at += time::Duration::seconds(1);
            other.progress_message = Some("taken over".into());
            h.jobs.insert(other);
            gate.release.notify_one();
        });

        assert_eq!(outcome.unwrap(), Advance::Skipped);
        let job = h.jobs.get(id);
        assert_eq!(job.progress_message.as_deref(), Some("taken over"));
        assert_eq!(job.input.current_scene_index, 0);
    }

    #[tokio::test]
    async fn failed_step_after_takeover_turns_into_skip() {
        let gate = Arc::new(Gate::default());
        let h = harness_with(FakeSpeech::gated_failing(gate.clone()), FakeRender::new(), settings());
        let id = h.insert(job_with(2));

        let (outcome, _) = tokio::join!(h.driver.advance(id), async {
            gate.entered.notified().await;
            let mut other = h.jobs.get(id);
            other.updated_at += time::Duration::seconds(1);
            other.progress_message = Some("taken over".into());
            h.jobs.insert(other);
            gate.release.notify_one();
        });

        assert_eq!(outcome.unwrap(), Advance::Skipped);
        let job = h.jobs.get(id);
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.error.is_none());
        assert_eq!(job.progress_message.as_deref(), Some("taken over"));
    }

    #[tokio::test]
    async fn step_over_budget_fails_the_job_and_clears_the_lease() {
        let gate = Arc::new(Gate::default());
        let tight = DriverSettings {
            step_budget: Duration::from_millis(50),
            ..settings()
        };
        let h = harness_with(FakeSpeech::gated(gate), FakeRender::new(), tight);
        let id = h.insert(job_with(1));

        let err = h.driver.advance(id).await.unwrap_err();

        assert_matches!(err, JobError::StepTimeout(budget) if budget == Duration::from_millis(50));
        let job = h.jobs.get(id);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(!job.is_processing);
        assert!(job.input.processed_scenes.is_empty());
    }

    #[tokio::test]
    async fn step_budget_stays_inside_the_lease() {
        let loose = DriverSettings {
            step_budget: Duration::from_secs(120),
            ..settings()
        };
        let h = harness_with(FakeSpeech::new(), FakeRender::new(), loose);

        assert_eq!(h.driver.settings.step_budget, Duration::from_secs(45));
    }

    #[tokio::test]
    async fn unreadable_cursor_fails_the_job_and_keeps_the_stored_input() {
        let h = harness();
        let mut job = job_with(2);
        job.unreadable_input = Some("invalid type: null, expected a sequence".into());
        let original = job.input.clone();
        let id = h.insert(job);

        let err = h.driver.advance(id).await.unwrap_err();

        assert_matches!(err, JobError::CorruptCursor(CursorError::Unreadable(_)));
        let job = h.jobs.get(id);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("stored input does not parse"));
        assert_eq!(job.input, original);
        assert!(h.speech.calls().is_empty());

        assert_matches!(h.driver.advance(id).await, Ok(Advance::Failed { .. }));
    }

    #[tokio::test]
    async fn unreadable_cursor_under_a_live_lease_is_skipped() {
        let h = harness();
        let mut job = job_with(1);
        job.unreadable_input = Some("missing field `index`".into());
        job.is_processing = true;
        job.status = JobStatus::Processing;
        job.updated_at = OffsetDateTime::now_utc();
        let id = h.insert(job.clone());

        assert_eq!(h.driver.advance(id).await.unwrap(), Advance::Skipped);
        assert_eq!(h.jobs.get(id), job);
    }

    #[tokio::test]
    async fn fresh_lease_is_respected() {
        let h = harness();
        let mut job = job_with(2);
        job.is_processing = true;
        job.status = JobStatus::Processing;
        job.updated_at = OffsetDateTime::now_utc();
        let id = h.insert(job.clone());

        assert_eq!(h.driver.advance(id).await.unwrap(), Advance::Skipped);
        assert_eq!(h.jobs.get(id), job);
    }

    #[tokio::test]
    async fn stale_lease_does_not_block_forever() {
        let h = harness();
        let mut job = job_with(2);
        job.is_processing = true;
        job.status = JobStatus::Processing;
        job.updated_at = OffsetDateTime::now_utc() - time::Duration::seconds(120);
        let id = h.insert(job);

        assert_eq!(h.driver.advance(id).await.unwrap(), Advance::Processed { scene_index: 0 });
        assert!(!h.jobs.get(id).is_processing);
    }

    #[tokio::test]
    async fn terminal_jobs_are_left_alone() {
        let h = harness();
        let id = h.insert(job_with(1));
        h.advance_n(id, 2).await;
        h.render.push_poll(Ok(RenderState::Completed { video_url: "https://cdn.test/v.mp4".into() }));
        h.driver.advance(id).await.unwrap();
        let finished = h.jobs.get(id);

        let replies = h.advance_n(id, 2).await;

        assert!(replies.iter().all(|r| *r == Advance::Completed { video_url: "https://cdn.test/v.mp4".into() }));
        assert_eq!(h.jobs.get(id), finished);
        assert_eq!(h.jobs.videos().len(), 1);
    }

    #[tokio::test]
    async fn failed_jobs_reply_with_their_error() {
        let h = harness();
        let mut job = job_with(1);
        job.fail("voice backend unavailable");
        let id = h.insert(job.clone());

        let outcome = h.driver.advance(id).await.unwrap();

        assert_eq!(outcome, Advance::Failed { error: "voice backend unavailable".into() });
        assert_eq!(h.jobs.get(id), job);
    }

    #[tokio::test]
    async fn synthesis_failure_fails_the_job_and_clears_the_lease() {
        let h = harness_with(FakeSpeech::always_failing(), FakeRender::new(), settings());
        let id = h.insert(job_with(2));

        let err = h.driver.advance(id).await.unwrap_err();

        assert_matches!(err, JobError::Synthesis { scene: 0, .. });
        let job = h.jobs.get(id);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(!job.is_processing);
        assert!(job.error.unwrap().contains("speech synthesis failed for scene 0"));
        assert!(job.input.processed_scenes.is_empty());
    }

    #[tokio::test]
    async fn transient_failures_are_retried_within_the_policy() {
        let retrying = DriverSettings {
            retry: RetryPolicy::new(2, Duration::ZERO),
            ..settings()
        };
        let h = harness_with(FakeSpeech::failing_times(1), FakeRender::new(), retrying);
        let id = h.insert(job_with(1));

        assert_eq!(h.driver.advance(id).await.unwrap(), Advance::Processed { scene_index: 0 });
        assert_eq!(h.speech.calls().len(), 2);
    }

    #[tokio::test]
    async fn submission_failure_is_fatal() {
        let h = harness_with(FakeSpeech::new(), FakeRender::failing_submit(), settings());
        let id = h.insert(job_with(1));
        h.driver.advance(id).await.unwrap();

        let err = h.driver.advance(id).await.unwrap_err();

        assert_matches!(err, JobError::RenderSubmission(RenderError::Api { status: 503, .. }));
        let job = h.jobs.get(id);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.input.pending_render.is_none());
        assert!(!job.is_processing);
    }

    #[tokio::test]
    async fn poll_transport_errors_fail_after_retries() {
        let h = harness();
        let id = h.insert(job_with(1));
        h.advance_n(id, 2).await;
        h.render.push_poll(Err(RenderError::InvalidResponse("missing status".into())));

        let err = h.driver.advance(id).await.unwrap_err();

        assert_matches!(err, JobError::RenderPoll(_));
        assert_eq!(h.jobs.get(id).status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn collected_assets_are_sanitized_in_batches() {
        let h = harness();
        let mut job = job_with(1);
        let scene_asset = job.input.scenes[0].asset_url.clone();
        let mut assets = vec![scene_asset];
        assets.extend((1..=5).map(|i| format!("data:text/plain,extra-{}", i)));
        job.input.all_assets = Some(assets);
        let id = h.insert(job);

        let outcomes = h.advance_n(id, 4).await;

        assert_eq!(
            outcomes,
            vec![
                Advance::Processed { scene_index: 0 },
                Advance::Sanitized { count: 3 },
                Advance::Sanitized { count: 2 },
                Advance::Rendering { render_id: "render-1".into() },
            ]
        );
        let job = h.jobs.get(id);
        let assets = job.input.all_assets.unwrap();
        assert_eq!(assets.len(), 6);
        assert_eq!(assets[0], job.input.processed_scenes[0].asset_url);
        assert!(assets.iter().all(|a| a.starts_with(TEST_PUBLIC_BASE)));
        assert!(assets[5].ends_with(&format!("jobs/{}/asset-5.txt", id)));
        // One object for the scene, five for the extras.
        assert_eq!(h.objects.object_count(), 6);
    }

    #[tokio::test]
    async fn sanitation_progress_counts_remaining_assets() {
        let h = harness();
        let mut job = job_with(1);
        job.input.all_assets = Some((0..4).map(|i| format!("data:text/plain,extra-{}", i)).collect());
        let id = h.insert(job);

        h.advance_n(id, 2).await;

        let job = h.jobs.get(id);
        assert_eq!(job.progress, 82);
        assert_eq!(job.progress_message.as_deref(), Some("Preparing assets (1 remaining)"));
    }

    #[tokio::test]
    async fn broken_collected_asset_fails_the_job() {
        let h = harness();
        let mut job = job_with(1);
        job.input.all_assets = Some(vec!["blob:https://app/lost".into()]);
        let id = h.insert(job);
        h.driver.advance(id).await.unwrap();

        let err = h.driver.advance(id).await.unwrap_err();

        assert_matches!(err, JobError::SanitationBatch(ref msg) if msg.starts_with("asset-0"));
        assert_eq!(h.jobs.get(id).status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn corrupt_cursor_fails_the_job() {
        let h = harness();
        let mut job = job_with(2);
        job.input.current_scene_index = 1;
        let id = h.insert(job);

        let err = h.driver.advance(id).await.unwrap_err();

        assert_matches!(err, JobError::CorruptCursor(CursorError::IndexMismatch { index: 1, processed: 0 }));
        let job = h.jobs.get(id);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(!job.is_processing);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let h = harness();
        let id = Uuid::new_v4();
        assert_matches!(h.driver.advance(id).await, Err(JobError::NotFound(missing)) if missing == id);
    }

    #[tokio::test]
    async fn pending_render_never_coexists_with_remaining_scenes() {
        let h = harness();
        let id = h.insert(job_with(3));

        for _ in 0..5 {
            h.driver.advance(id).await.unwrap();
            let job = h.jobs.get(id);
            let remaining = job.input.current_scene_index < job.input.scenes.len();
            assert!(!(remaining && job.input.pending_render.is_some()));
            assert_eq!(job.input.current_scene_index, job.input.processed_scenes.len());
        }
    }
}
