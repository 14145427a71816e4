use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::error::JobError;
use super::model::{ProcessedScene, SceneInput};
use super::normalizer::AssetNormalizer;
use crate::common::retry::RetryPolicy;
use crate::infrastructure::speech::SpeechSynthesizer;

/// Produces one finished scene: a durable visual plus narrated audio.
pub struct SceneSynthesizer {
    normalizer: Arc<AssetNormalizer>,
    speech: Arc<dyn SpeechSynthesizer>,
    retry: RetryPolicy,
}

impl SceneSynthesizer {
    pub fn new(normalizer: Arc<AssetNormalizer>, speech: Arc<dyn SpeechSynthesizer>, retry: RetryPolicy) -> Self {
        Self { normalizer, speech, retry }
    }

    pub async fn synthesize(
        &self,
        job_id: Uuid,
        index: usize,
        scene: &SceneInput,
        voice_id: &str,
    ) -> Result<ProcessedScene, JobError> {
        let slot = format!("scene-{}", index);
        let asset_url = self
            .retry
            .run("asset normalization", || self.normalizer.normalize(&scene.asset_url, job_id, &slot))
            .await
            .map_err(|source| JobError::Normalization { slot: slot.clone(), source })?;

        let clip = self
            .retry
            .run("speech synthesis", || self.speech.synthesize(&scene.text, voice_id))
            .await
            .map_err(|source| JobError::Synthesis { scene: index, source })?;

        debug!(%job_id, scene_index = index, duration = clip.duration, "Scene synthesized");

        Ok(ProcessedScene {
            index,
            text: scene.text.clone(),
            asset_url,
            audio_url: clip.audio_url,
            duration: clip.duration,
        })
    }
}
