use async_trait::async_trait;
use serde::Serialize;

use super::{SpeechClip, SpeechError, SpeechSynthesizer};

/// HTTP client for the hosted speech service.
pub struct SpeechApi {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
}

impl SpeechApi {
    /// * `api_url` - Base HTTP URL, e.g. `https://speech.internal`.
    pub fn with_client(client: reqwest::Client, api_url: String, api_key: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for SpeechApi {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<SpeechClip, SpeechError> {
        let response = self
            .client
            .post(format!("{}/v1/speech", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest { text, voice_id })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SpeechError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let clip: SpeechClip = response.json().await?;
        if clip.audio_url.is_empty() {
            return Err(SpeechError::InvalidClip("empty audioUrl".to_string()));
        }
        if !clip.duration.is_finite() || clip.duration <= 0.0 {
            return Err(SpeechError::InvalidClip(format!(
                "duration {} is not positive",
                clip.duration
            )));
        }
        Ok(clip)
    }
}
