use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

#[cfg(test)]
pub mod memory;
pub mod s3;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to upload object '{key}': {message}")]
    Upload { key: String, message: String },

    #[error("Invalid public storage URL '{0}'")]
    InvalidPublicUrl(String),
}

/// Durable object storage with deterministic, publicly fetchable URLs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes `body` at `key`, replacing any existing object, and returns the
    /// durable URL of the object.
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, StorageError>;

    /// The URL an object stored at `key` is served from.
    fn public_url(&self, key: &str) -> String;

    /// Whether `url` already points into this store.
    fn is_durable(&self, url: &str) -> bool;
}

/// Origin + path prefix check shared by every store implementation.
#[derive(Clone, Debug)]
pub struct PublicBase {
    base: Url,
}

impl PublicBase {
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let trimmed = raw.trim_end_matches('/');
        let base = Url::parse(&format!("{}/", trimmed))
            .map_err(|_| StorageError::InvalidPublicUrl(raw.to_string()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(StorageError::InvalidPublicUrl(raw.to_string()));
        }
        Ok(Self { base })
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}{}", self.base, key.trim_start_matches('/'))
    }

    pub fn contains(&self, candidate: &str) -> bool {
        match Url::parse(candidate) {
            Ok(url) => {
                url.origin() == self.base.origin() && url.path().starts_with(self.base.path())
            }
            Err(_) => false,
        }
    }
}
