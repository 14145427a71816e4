//! Text-to-speech provider seam.
//!
//! The provider is a black box that turns text into a hosted audio file and
//! reports how long it plays.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod client;

/// A synthesized narration clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechClip {
    pub audio_url: String,
    /// Playback length in seconds.
    pub duration: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("speech request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status code.
    #[error("speech provider error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The provider answered 2xx with an unusable body.
    #[error("speech provider returned an invalid clip: {0}")]
    InvalidClip(String),
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<SpeechClip, SpeechError>;
}
