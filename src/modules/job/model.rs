use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::modules::composition::builder::DEFAULT_ASPECT_RATIO;
use crate::modules::composition::captions::DEFAULT_STYLE;
use crate::modules::composition::model::RenderOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// One narrated unit as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneInput {
    pub text: String,
    #[serde(default)]
    pub asset_url: String,
}

/// A finished scene. Never modified once appended to the cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedScene {
    pub index: usize,
    pub text: String,
    pub asset_url: String,
    pub audio_url: String,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRender {
    pub render_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
}

fn default_aspect_ratio() -> String {
    DEFAULT_ASPECT_RATIO.to_string()
}

fn default_caption_style() -> String {
    DEFAULT_STYLE.to_string()
}

/// The `input_data` column: submitted inputs plus the continuation cursor.
///
/// This is the durable wire format and must stay readable by older and
/// newer builds. Keys this build does not know about are kept in `extra`
/// and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InputData {
    #[serde(default)]
    #[validate(length(min = 1, message = "at least one scene is required"))]
    pub scenes: Vec<SceneInput>,
    #[serde(default)]
    #[validate(length(min = 1, message = "a voice id is required"))]
    pub voice_id: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_caption_style")]
    pub caption_style: String,
    #[serde(default)]
    pub enable_captions: bool,
    #[serde(default)]
    pub enable_background_music: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_music_url: Option<String>,
    #[serde(default)]
    pub processed_scenes: Vec<ProcessedScene>,
    #[serde(default)]
    pub current_scene_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_render: Option<PendingRender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_assets: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InputData {
    pub fn new(scenes: Vec<SceneInput>, voice_id: &str) -> Self {
        Self {
            scenes,
            voice_id: voice_id.to_string(),
            aspect_ratio: default_aspect_ratio(),
            caption_style: default_caption_style(),
            enable_captions: false,
            enable_background_music: false,
            background_music_url: None,
            processed_scenes: Vec::new(),
            current_scene_index: 0,
            pending_render: None,
            all_assets: None,
            extra: Map::new(),
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            aspect_ratio: self.aspect_ratio.clone(),
            caption_style: self.caption_style.clone(),
            enable_captions: self.enable_captions,
            enable_background_music: self.enable_background_music,
            background_music_url: self.background_music_url.clone(),
        }
    }

    /// Human-readable summary of validation failures, or `None` when valid.
    pub fn validation_message(&self) -> Option<String> {
        let errors = self.validate().err()?;
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        messages.sort();
        Some(messages.join("; "))
    }
}

/// `result_data` written when the render completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub video_url: String,
    pub render_id: String,
    pub duration: f64,
    pub scene_count: usize,
    pub assets: Vec<String>,
}

/// Permanent record of a delivered video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRecord {
    pub id: Uuid,
    pub job_id: Uuid,
    pub video_url: String,
    pub duration_seconds: f64,
    pub scene_count: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: i32,
    pub progress_message: Option<String>,
    /// Lease flag; see `lease.rs`.
    pub is_processing: bool,
    pub updated_at: OffsetDateTime,
    pub input: InputData,
    pub result: Option<Value>,
    pub error: Option<String>,
    /// Set when the stored `input_data` did not parse. `input` is then empty
    /// and must never be written back over the stored value.
    pub unreadable_input: Option<String>,
}

impl Job {
    pub fn new(id: Uuid, input: InputData, now: OffsetDateTime) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            progress: 0,
            progress_message: None,
            is_processing: false,
            updated_at: now,
            input,
            result: None,
            error: None,
            unreadable_input: None,
        }
    }

    pub fn set_progress(&mut self, progress: i32, message: impl Into<String>) {
        self.progress = progress.clamp(0, 100);
        self.progress_message = Some(message.into());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.progress_message = Some("Failed".to_string());
    }

    pub fn complete(&mut self, result: &JobResult) {
        self.status = JobStatus::Completed;
        self.result = serde_json::to_value(result).ok();
        self.error = None;
        self.set_progress(100, "Video ready");
    }

    pub fn video_url(&self) -> Option<&str> {
        self.result.as_ref()?.get("videoUrl")?.as_str()
    }
}
