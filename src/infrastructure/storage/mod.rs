//! Object storage backends.

pub mod memory;
pub mod supabase;

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use mockall::automock;

use crate::errors::StorageError;

pub use memory::MemoryObjectStore;
pub use supabase::SupabaseStorage;

/// Path-addressed object storage.
///
/// `put` is idempotent per path: writing the same path twice replaces the
/// object, so a retried variant job cannot leave duplicates behind. `create`
/// never replaces anything and is used for originals, whose path is fixed
/// once assigned.
#[automock]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path`, replacing any existing object, and return the
    /// public URL of the object.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError>;

    /// Store a new object at `path`; [`StorageError::AlreadyExists`] when the
    /// path is taken.
    async fn create(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError>;

    /// Fetch the object stored at `path`.
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Public URL for `path`, whether or not the object exists yet.
    fn public_url(&self, path: &str) -> String;

    /// Cheap reachability check used by the health endpoint.
    async fn check(&self) -> Result<(), StorageError>;

    fn backend_name(&self) -> &'static str;
}

/// Bounds a storage call; an elapsed timer becomes [`StorageError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout(limit)),
    }
}
