use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{ObjectStore, PublicBase, StorageError};

pub const TEST_PUBLIC_BASE: &str = "https://assets.test/bucket";

#[derive(Clone, Debug, PartialEq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

/// In-memory store used by the unit tests.
pub struct MemoryStore {
    public: PublicBase,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    writes: Mutex<usize>,
    fail_uploads: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            public: PublicBase::parse(TEST_PUBLIC_BASE).expect("valid test base"),
            objects: Mutex::new(BTreeMap::new()),
            writes: Mutex::new(0),
            fail_uploads: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_uploads: true,
            ..Self::new()
        }
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, StorageError> {
        if self.fail_uploads {
            return Err(StorageError::Upload {
                key: key.to_string(),
                message: "bucket unavailable".to_string(),
            });
        }
        *self.writes.lock().unwrap() += 1;
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(self.public_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        self.public.url_for(key)
    }

    fn is_durable(&self, url: &str) -> bool {
        self.public.contains(url)
    }
}
