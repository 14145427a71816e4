use thiserror::Error;
use uuid::Uuid;

use super::cursor::CursorError;
use super::normalizer::NormalizeError;
use super::repository::StoreError;
use crate::infrastructure::render::RenderError;
use crate::infrastructure::speech::SpeechError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job is being advanced by another caller")]
    LeaseContention,

    #[error("invalid job input: {0}")]
    Validation(String),

    #[error("speech synthesis failed for scene {scene}: {source}")]
    Synthesis {
        scene: usize,
        #[source]
        source: SpeechError,
    },

    #[error("could not normalize asset for {slot}: {source}")]
    Normalization {
        slot: String,
        #[source]
        source: NormalizeError,
    },

    #[error("render submission failed: {0}")]
    RenderSubmission(#[source] RenderError),

    #[error("render status check failed: {0}")]
    RenderPoll(#[source] RenderError),

    #[error("{0}")]
    RenderFailure(String),

    #[error("step did not finish within {0:?}")]
    StepTimeout(std::time::Duration),

    #[error("asset sanitation failed: {0}")]
    SanitationBatch(String),

    #[error("job cursor is corrupt: {0}")]
    CorruptCursor(#[from] CursorError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl JobError {
    /// Errors that end the job. Contention and lookups leave it untouched.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, JobError::NotFound(_) | JobError::LeaseContention | JobError::Store(_))
    }
}
