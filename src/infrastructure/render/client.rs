use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{RenderClient, RenderError, RenderState};
use crate::modules::composition::model::CompositionPayload;

/// HTTP client for the hosted composition renderer.
pub struct RenderApi {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    url: Option<String>,
    error: Option<String>,
}

impl RenderApi {
    pub fn with_client(client: reqwest::Client, api_url: String, api_key: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// `{api_url}/v1/renders/{render_id}` with the id as one encoded segment.
    fn render_url(&self, render_id: &str) -> Result<Url, RenderError> {
        let mut url = Url::parse(&self.api_url).map_err(|e| RenderError::Endpoint(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| RenderError::Endpoint(self.api_url.clone()))?
            .pop_if_empty()
            .extend(["v1", "renders", render_id]);
        Ok(url)
    }

    /// Ensure the response has a success status code, otherwise turn it into
    /// an [`RenderError::Api`] carrying the body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RenderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RenderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

fn classify(status: StatusResponse) -> Result<RenderState, RenderError> {
    let normalized = status.status.to_ascii_lowercase();
    match normalized.as_str() {
        "done" | "completed" | "succeeded" => match status.url {
            Some(url) if !url.is_empty() => Ok(RenderState::Completed { video_url: url }),
            _ => Err(RenderError::InvalidResponse(format!(
                "render reported '{}' without a video url",
                status.status
            ))),
        },
        "queued" | "pending" | "fetching" | "rendering" | "saving" | "processing" => {
            Ok(RenderState::Running {
                status: status.status,
            })
        }
        _ => Ok(RenderState::Failed {
            reason: status
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or(status.status),
        }),
    }
}

#[async_trait]
impl RenderClient for RenderApi {
    async fn submit(&self, payload: &CompositionPayload) -> Result<String, RenderError> {
        let response = self
            .client
            .post(format!("{}/v1/renders", self.api_url))
            .header("x-api-key", &self.api_key)
            .json(payload)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::ensure_success(response).await?.json().await?;
        if submitted.id.is_empty() {
            return Err(RenderError::InvalidResponse("empty render id".to_string()));
        }
        Ok(submitted.id)
    }

    async fn poll(&self, render_id: &str) -> Result<RenderState, RenderError> {
        let response = self
            .client
            .get(self.render_url(render_id)?)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let status: StatusResponse = Self::ensure_success(response).await?.json().await?;
        classify(status)
    }
}
