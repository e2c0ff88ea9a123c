use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};

use super::ObjectStore;
use crate::errors::StorageError;

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// Process-local object store for development and tests.
#[derive(Clone)]
pub struct MemoryObjectStore {
    objects: Arc<DashMap<String, StoredObject>>,
    public_base_url: String,
}

impl MemoryObjectStore {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        MemoryObjectStore {
            objects: Arc::new(DashMap::new()),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.contains_key(path)
    }

    pub fn content_type(&self, path: &str) -> Option<String> {
        self.objects.get(path).map(|o| o.content_type.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        self.objects.insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(self.public_url(path))
    }

    async fn create(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        match self.objects.entry(path.to_string()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists(path.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(StoredObject {
                    bytes,
                    content_type: content_type.to_string(),
                });
                Ok(self.public_url(path))
            }
        }
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .get(path)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path)
    }

    async fn check(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
