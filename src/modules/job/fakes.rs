//! Scripted stand-ins for the external services.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Notify;

use crate::infrastructure::render::{RenderClient, RenderError, RenderState};
use crate::infrastructure::speech::{SpeechClip, SpeechError, SpeechSynthesizer};
use crate::modules::composition::model::CompositionPayload;

/// Lets a test hold a speech call open while it does something else.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
pub struct FakeSpeech {
    calls: Mutex<Vec<String>>,
    failures_left: AtomicU32,
    always_fail: bool,
    gate: Option<std::sync::Arc<Gate>>,
}

impl FakeSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_times(n: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(n),
            ..Self::default()
        }
    }

    pub fn always_failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    pub fn gated(gate: std::sync::Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn gated_failing(gate: std::sync::Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            always_fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str, _voice_id: &str) -> Result<SpeechClip, SpeechError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(text.to_string());
            calls.len()
        };

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let transient = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if self.always_fail || transient {
            return Err(SpeechError::Api {
                status: 503,
                body: "voice backend unavailable".to_string(),
            });
        }

        Ok(SpeechClip {
            audio_url: format!("https://audio.test/clip-{}.mp3", n),
            duration: 2.0 + n as f64 * 0.5,
        })
    }
}

#[derive(Default)]
pub struct FakeRender {
    submitted: Mutex<Vec<CompositionPayload>>,
    polls: Mutex<VecDeque<Result<RenderState, RenderError>>>,
    fail_submit: bool,
}

impl FakeRender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_submit() -> Self {
        Self {
            fail_submit: true,
            ..Self::default()
        }
    }

    /// Queues the answer for the next poll. Unscripted polls report "rendering".
    pub fn push_poll(&self, state: Result<RenderState, RenderError>) {
        self.polls.lock().unwrap().push_back(state);
    }

    pub fn submitted(&self) -> Vec<CompositionPayload> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderClient for FakeRender {
    async fn submit(&self, payload: &CompositionPayload) -> Result<String, RenderError> {
        if self.fail_submit {
            return Err(RenderError::Api {
                status: 503,
                body: "renderer offline".to_string(),
            });
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(payload.clone());
        Ok(format!("render-{}", submitted.len()))
    }

    async fn poll(&self, _render_id: &str) -> Result<RenderState, RenderError> {
        self.polls.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(RenderState::Running {
                status: "rendering".to_string(),
            })
        })
    }
}
