//! In-memory form of the continuation cursor stored in `input_data`.
//!
//! The wire format is flat (`processedScenes`, `currentSceneIndex`,
//! `pendingRender`, `allAssets`). Here it becomes a [`Stage`] so that a
//! pending render can only exist once every scene is processed.

use thiserror::Error;

use super::model::{InputData, JobStatus, PendingRender, ProcessedScene};

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    AwaitingScenes,
    AwaitingSanitation,
    AwaitingRenderSubmission,
    AwaitingRenderCompletion(PendingRender),
    Done,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::AwaitingScenes => "awaiting_scenes",
            Stage::AwaitingSanitation => "awaiting_sanitation",
            Stage::AwaitingRenderSubmission => "awaiting_render_submission",
            Stage::AwaitingRenderCompletion(_) => "awaiting_render_completion",
            Stage::Done => "done",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CursorError {
    #[error("cursor says {index} scenes are done but {processed} are recorded")]
    IndexMismatch { index: usize, processed: usize },

    #[error("processed scene at position {position} carries index {index}")]
    OutOfOrder { position: usize, index: usize },

    #[error("{processed} scenes processed but only {total} were submitted")]
    TooManyScenes { processed: usize, total: usize },

    #[error("render {render_id} is pending while {remaining} scenes remain")]
    RenderWithScenesRemaining { render_id: String, remaining: usize },

    #[error("cannot {action} while {stage}")]
    WrongStage { action: &'static str, stage: &'static str },

    #[error("stored input does not parse: {0}")]
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobCursor {
    total_scenes: usize,
    processed: Vec<ProcessedScene>,
    assets: Option<Vec<String>>,
    stage: Stage,
}

impl JobCursor {
    pub fn restore<F>(status: JobStatus, input: &InputData, is_durable: F) -> Result<Self, CursorError>
    where
        F: Fn(&str) -> bool,
    {
        let total = input.scenes.len();
        let processed = &input.processed_scenes;

        if input.current_scene_index != processed.len() {
            return Err(CursorError::IndexMismatch {
                index: input.current_scene_index,
                processed: processed.len(),
            });
        }
        if let Some((position, scene)) = processed.iter().enumerate().find(|(i, s)| s.index != *i) {
            return Err(CursorError::OutOfOrder { position, index: scene.index });
        }
        if processed.len() > total {
            return Err(CursorError::TooManyScenes { processed: processed.len(), total });
        }

        let mut cursor = Self {
            total_scenes: total,
            processed: processed.clone(),
            assets: input.all_assets.clone(),
            stage: Stage::AwaitingScenes,
        };

        if status.is_terminal() {
            cursor.stage = Stage::Done;
            return Ok(cursor);
        }

        match &input.pending_render {
            Some(pending) if cursor.remaining_scenes() > 0 => Err(CursorError::RenderWithScenesRemaining {
                render_id: pending.render_id.clone(),
                remaining: cursor.remaining_scenes(),
            }),
            Some(pending) => {
                cursor.stage = Stage::AwaitingRenderCompletion(pending.clone());
                Ok(cursor)
            }
            None => {
                cursor.settle(&is_durable);
                Ok(cursor)
            }
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn total_scenes(&self) -> usize {
        self.total_scenes
    }

    pub fn processed(&self) -> &[ProcessedScene] {
        &self.processed
    }

    pub fn current_scene_index(&self) -> usize {
        self.processed.len()
    }

    pub fn remaining_scenes(&self) -> usize {
        self.total_scenes - self.processed.len()
    }

    /// Every asset the job owns: the collected list when present, otherwise the scene assets.
    pub fn assets(&self) -> Vec<String> {
        match &self.assets {
            Some(assets) => assets.clone(),
            None => self.processed.iter().map(|s| s.asset_url.clone()).collect(),
        }
    }

    /// Appends a finished scene. Entries of the collected asset list equal to
    /// `original_ref` are swapped for the scene's durable asset.
    pub fn record_scene<F>(&mut self, scene: ProcessedScene, original_ref: &str, is_durable: F) -> Result<(), CursorError>
    where
        F: Fn(&str) -> bool,
    {
        self.expect_stage("record a scene", |s| matches!(s, Stage::AwaitingScenes))?;
        let position = self.processed.len();
        if scene.index != position {
            return Err(CursorError::OutOfOrder { position, index: scene.index });
        }

        if let Some(assets) = self.assets.as_mut() {
            for asset in assets.iter_mut().filter(|a| a.as_str() == original_ref) {
                *asset = scene.asset_url.clone();
            }
        }
        self.processed.push(scene);
        self.settle(&is_durable);
        Ok(())
    }

    /// Up to `limit` collected assets that are not durable yet, with their positions.
    pub fn pending_assets<F>(&self, is_durable: F, limit: usize) -> Vec<(usize, String)>
    where
        F: Fn(&str) -> bool,
    {
        self.assets
            .iter()
            .flatten()
            .enumerate()
            .filter(|(_, url)| !is_durable(url.as_str()))
            .take(limit)
            .map(|(position, url)| (position, url.clone()))
            .collect()
    }

    pub fn count_pending_assets<F>(&self, is_durable: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        self.assets.iter().flatten().filter(|url| !is_durable(url.as_str())).count()
    }

    pub fn replace_asset(&mut self, position: usize, durable_url: String) -> Result<(), CursorError> {
        self.expect_stage("replace an asset", |s| matches!(s, Stage::AwaitingSanitation))?;
        if let Some(slot) = self.assets.as_mut().and_then(|a| a.get_mut(position)) {
            *slot = durable_url;
        }
        Ok(())
    }

    /// Re-derives the stage after a sanitation batch.
    pub fn refresh<F>(&mut self, is_durable: F)
    where
        F: Fn(&str) -> bool,
    {
        if matches!(self.stage, Stage::AwaitingScenes | Stage::AwaitingSanitation | Stage::AwaitingRenderSubmission) {
            self.settle(&is_durable);
        }
    }

    pub fn begin_render(&mut self, pending: PendingRender) -> Result<(), CursorError> {
        self.expect_stage("start a render", |s| matches!(s, Stage::AwaitingRenderSubmission))?;
        self.stage = Stage::AwaitingRenderCompletion(pending);
        Ok(())
    }

    pub fn finish(&mut self) {
        self.stage = Stage::Done;
    }

    /// Writes the cursor back into the wire format, leaving every other field alone.
    pub fn write_into(&self, input: &mut InputData) {
        input.processed_scenes = self.processed.clone();
        input.current_scene_index = self.processed.len();
        input.all_assets = self.assets.clone();
        input.pending_render = match &self.stage {
            Stage::AwaitingRenderCompletion(pending) => Some(pending.clone()),
            _ => None,
        };
    }

    fn settle(&mut self, is_durable: &dyn Fn(&str) -> bool) {
        self.stage = if self.remaining_scenes() > 0 {
            Stage::AwaitingScenes
        } else if self.assets.iter().flatten().any(|url| !is_durable(url.as_str())) {
            Stage::AwaitingSanitation
        } else {
            Stage::AwaitingRenderSubmission
        };
    }

    fn expect_stage(&self, action: &'static str, allowed: impl Fn(&Stage) -> bool) -> Result<(), CursorError> {
        if allowed(&self.stage) {
            Ok(())
        } else {
            Err(CursorError::WrongStage { action, stage: self.stage.name() })
        }
    }
}
