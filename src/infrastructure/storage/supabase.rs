use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Response, StatusCode};
use zeroize::Zeroizing;

use super::ObjectStore;
use crate::{errors::StorageError, settings::AppConfig};

/// Supabase Storage accessed over its REST API with the service key.
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    bucket: String,
    service_key: Zeroizing<String>,
}

impl SupabaseStorage {
    pub fn new(config: &AppConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(config.storage_timeout())
            .build()?;

        Ok(SupabaseStorage {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            bucket: config.storage_bucket.clone(),
            service_key: config.service_key(),
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, encode_path(path))
    }

    async fn into_error(response: Response, path: &str) -> StorageError {
        let status = response.status();
        let message = response.text().await.unwrap_or_default();
        classify(status, message, path)
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<String, StorageError> {
        let response = self
            .client
            .post(self.object_url(path))
            .bearer_auth(self.service_key.as_str())
            .header("apikey", self.service_key.as_str())
            .header("x-upsert", if upsert { "true" } else { "false" })
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::into_error(response, path).await);
        }
        tracing::debug!(path, bucket = %self.bucket, upsert, "object stored");
        Ok(self.public_url(path))
    }
}

/// Storage answers a taken path with 409, or with 400 and a "Duplicate"
/// body on older deployments.
fn classify(status: StatusCode, message: String, path: &str) -> StorageError {
    let duplicate = message.contains("Duplicate") || message.contains("already exists");
    match status {
        StatusCode::NOT_FOUND => StorageError::NotFound(path.to_string()),
        StatusCode::CONFLICT => StorageError::AlreadyExists(path.to_string()),
        StatusCode::BAD_REQUEST if duplicate => StorageError::AlreadyExists(path.to_string()),
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            StorageError::Unavailable(format!("{}: {}", s, message))
        }
        s => StorageError::Rejected { status: s.as_u16(), message },
    }
}

/// Percent-encodes each path segment while keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        self.upload(path, bytes, content_type, true).await
    }

    async fn create(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        self.upload(path, bytes, content_type, false).await
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get(self.object_url(path))
            .bearer_auth(self.service_key.as_str())
            .header("apikey", self.service_key.as_str())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::into_error(response, path).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            encode_path(path)
        )
    }

    async fn check(&self) -> Result<(), StorageError> {
        let response = self
            .client
            .get(format!("{}/storage/v1/bucket/{}", self.base_url, self.bucket))
            .bearer_auth(self.service_key.as_str())
            .header("apikey", self.service_key.as_str())
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::into_error(response, &self.bucket).await)
        }
    }

    fn backend_name(&self) -> &'static str {
        "supabase"
    }
}
