use serde::Serialize;
use utoipa::ToSchema;

use super::driver::Advance;
use super::model::{Job, JobStatus};

/// Outcome of one `advance` call. Exactly one of the flags is set.
#[derive(Debug, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendering: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_id: Option<String>,
    /// `false` together with `status` while the render is still running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl From<Advance> for AdvanceResponse {
    fn from(outcome: Advance) -> Self {
        match outcome {
            Advance::Skipped => Self {
                skipped: Some(true),
                ..Self::default()
            },
            Advance::Processed { scene_index } => Self {
                processed: Some(true),
                scene_index: Some(scene_index),
                ..Self::default()
            },
            Advance::Sanitized { count } => Self {
                sanitized: Some(true),
                count: Some(count),
                ..Self::default()
            },
            Advance::Rendering { render_id } => Self {
                rendering: Some(true),
                render_id: Some(render_id),
                ..Self::default()
            },
            Advance::StillRendering { status } => Self {
                completed: Some(false),
                status: Some(status),
                ..Self::default()
            },
            Advance::Completed { video_url } => Self {
                completed: Some(true),
                video_url: Some(video_url),
                ..Self::default()
            },
            Advance::Failed { error } => Self {
                failed: Some(true),
                error: Some(error),
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub status: String,
    pub progress: i32,
    pub progress_message: Option<String>,
    pub current_scene_index: usize,
    pub total_scenes: usize,
    pub processed_scenes_count: usize,
    pub is_rendering: bool,
    /// Present only when the job failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present only when the job completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            status: job.status.to_string(),
            progress: job.progress,
            progress_message: job.progress_message.clone(),
            current_scene_index: job.input.current_scene_index,
            total_scenes: job.input.scenes.len(),
            processed_scenes_count: job.input.processed_scenes.len(),
            is_rendering: job.status == JobStatus::Processing && job.input.pending_render.is_some(),
            error: match job.status {
                JobStatus::Failed => job.error.clone(),
                _ => None,
            },
            video_url: match job.status {
                JobStatus::Completed => job.video_url().map(str::to_string),
                _ => None,
            },
        }
    }
}
