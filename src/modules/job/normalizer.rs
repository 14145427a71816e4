//! Turns embedded and foreign asset references into durable URLs.
//!
//! Every write lands at `jobs/{job_id}/{slot}.{ext}` and overwrites whatever
//! is there, so normalizing the same slot twice yields the same URL.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::{Bytes, BytesMut};
use mime::Mime;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::infrastructure::storage::{ObjectStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("unsupported asset reference '{0}'")]
    InvalidReference(String),

    #[error("could not decode embedded asset: {0}")]
    Decode(String),

    #[error("failed to fetch asset: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("fetching {url} returned HTTP {status}")]
    FetchStatus { url: String, status: u16 },

    #[error("asset at {url} is larger than {limit} bytes")]
    TooLarge { url: String, limit: u64 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What kind of reference an asset URL is.
#[derive(Debug, PartialEq)]
pub enum AssetRef {
    Embedded { content_type: String, body: Bytes },
    Durable,
    Remote(Url),
}

impl AssetRef {
    pub fn classify(reference: &str, is_durable: impl Fn(&str) -> bool) -> Result<Self, NormalizeError> {
        let trimmed = reference.trim();
        if let Some(rest) = trimmed.strip_prefix("data:") {
            return decode_data_url(rest);
        }
        if is_durable(trimmed) {
            return Ok(AssetRef::Durable);
        }
        match Url::parse(trimmed) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(AssetRef::Remote(url)),
            _ => Err(NormalizeError::InvalidReference(preview(trimmed))),
        }
    }
}

fn decode_data_url(rest: &str) -> Result<AssetRef, NormalizeError> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| NormalizeError::Decode("data URL has no payload".to_string()))?;

    let mut params = meta.split(';');
    let content_type = match params.next().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_ascii_lowercase(),
        _ => mime::TEXT_PLAIN.to_string(),
    };
    let is_base64 = params.any(|p| p.trim().eq_ignore_ascii_case("base64"));

    let body = if is_base64 {
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD
            .decode(compact)
            .map_err(|e| NormalizeError::Decode(e.to_string()))?
    } else {
        payload.as_bytes().to_vec()
    };

    if body.is_empty() {
        return Err(NormalizeError::Decode("embedded asset is empty".to_string()));
    }

    Ok(AssetRef::Embedded {
        content_type,
        body: Bytes::from(body),
    })
}

fn preview(reference: &str) -> String {
    if reference.len() <= 64 {
        reference.to_string()
    } else {
        let cut = (0..=64).rev().find(|i| reference.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &reference[..cut])
    }
}

pub fn extension_for(content_type: &str) -> String {
    let Ok(parsed) = content_type.parse::<Mime>() else {
        return "bin".to_string();
    };
    let known = match parsed.essence_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "video/mp4" => Some("mp4"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "text/plain" => Some("txt"),
        _ => None,
    };
    known
        .map(str::to_string)
        .or_else(|| {
            mime_guess::get_mime_extensions(&parsed)
                .and_then(|exts| exts.first())
                .map(|ext| ext.to_string())
        })
        .unwrap_or_else(|| "bin".to_string())
}

pub fn object_key(job_id: Uuid, slot: &str, content_type: &str) -> String {
    format!("jobs/{}/{}.{}", job_id, slot, extension_for(content_type))
}

pub struct AssetNormalizer {
    store: Arc<dyn ObjectStore>,
    http: reqwest::Client,
    /// Largest foreign asset we are willing to buffer.
    max_bytes: u64,
}

impl AssetNormalizer {
    pub fn new(store: Arc<dyn ObjectStore>, http: reqwest::Client, max_bytes: u64) -> Self {
        Self { store, http, max_bytes }
    }

    pub fn is_durable(&self, url: &str) -> bool {
        self.store.is_durable(url)
    }

    pub async fn normalize(&self, reference: &str, job_id: Uuid, slot: &str) -> Result<String, NormalizeError> {
        match AssetRef::classify(reference, |u| self.store.is_durable(u))? {
            AssetRef::Durable => Ok(reference.trim().to_string()),
            AssetRef::Embedded { content_type, body } => {
                let key = object_key(job_id, slot, &content_type);
                debug!(%job_id, slot, key = %key, "Storing embedded asset");
                Ok(self.store.put(&key, body, &content_type).await?)
            }
            AssetRef::Remote(url) => {
                let (content_type, body) = self.fetch(&url).await?;
                let key = object_key(job_id, slot, &content_type);
                debug!(%job_id, slot, key = %key, source = %url, "Re-hosting remote asset");
                Ok(self.store.put(&key, body, &content_type).await?)
            }
        }
    }

    async fn fetch(&self, url: &Url) -> Result<(String, Bytes), NormalizeError> {
        let mut response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NormalizeError::FetchStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<Mime>().ok())
            .filter(|m| *m != mime::APPLICATION_OCTET_STREAM);
        let content_type = declared
            .unwrap_or_else(|| mime_guess::from_path(url.path()).first_or_octet_stream())
            .essence_str()
            .to_string();

        let too_large = || NormalizeError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        };
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(too_large());
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok((content_type, body.freeze()))
    }
}
