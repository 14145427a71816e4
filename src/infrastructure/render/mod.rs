//! Remote composition renderer seam.
//!
//! Rendering is a submit/poll job on an external service. `poll` must be
//! safe to call any number of times, in any order, from any invocation.

use async_trait::async_trait;

use crate::modules::composition::model::CompositionPayload;

pub mod client;

/// Where a render stands according to the last poll.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    /// Still queued or rendering; carries the upstream status text.
    Running { status: String },
    Completed { video_url: String },
    /// Terminal upstream failure; carries the upstream reason.
    Failed { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("render request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The renderer answered with a non-2xx status code.
    #[error("render service error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("invalid render endpoint: {0}")]
    Endpoint(String),

    /// The renderer answered 2xx with a body we cannot act on.
    #[error("render service returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait RenderClient: Send + Sync {
    /// Queue a render and return the service's render id.
    async fn submit(&self, payload: &CompositionPayload) -> Result<String, RenderError>;

    async fn poll(&self, render_id: &str) -> Result<RenderState, RenderError>;
}
