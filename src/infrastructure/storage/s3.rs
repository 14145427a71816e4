use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tracing::{debug, info};

use super::{ObjectStore, PublicBase, StorageError};

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
    public: PublicBase,
}

impl StorageService {
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
        public_url: &str,
    ) -> Result<Self, StorageError> {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);
        let public = PublicBase::parse(public_url)?;

        info!("✅ Connected to S3 (MinIO), serving assets from {}", public_url);

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            public,
        })
    }
}

#[async_trait]
impl ObjectStore for StorageService {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, StorageError> {
        let size = body.len();

        // PutObject overwrites, which is what makes re-normalizing a slot idempotent.
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                message: aws_sdk_s3::Error::from(e).to_string(),
            })?;

        debug!(key, size, content_type, "Stored object");
        Ok(self.public_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        self.public.url_for(key)
    }

    fn is_durable(&self, url: &str) -> bool {
        self.public.contains(url)
    }
}
