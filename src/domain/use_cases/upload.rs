use std::{sync::Arc, time::Duration};

use uuid::Uuid;

use crate::{
    entities::photo::{NewPhoto, Photo},
    errors::{AppError, StorageError},
    repositories::{harvest::HarvestRepository, photo::PhotoRepository},
    settings::AppConfig,
    storage::{with_timeout, ObjectStore},
    utils::{
        clock::MonotonicClock,
        filename::sanitize_filename,
        valid_uuid::{valid_user_id, valid_uuid},
    },
};

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_file_size: usize,
    pub max_filename_length: usize,
    pub storage_timeout: Duration,
}

impl UploadLimits {
    pub fn from_config(config: &AppConfig) -> Self {
        UploadLimits {
            max_file_size: config.max_file_size,
            max_filename_length: config.max_filename_length,
            storage_timeout: config.storage_timeout(),
        }
    }
}

/// An already client-compressed image on its way into storage.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub user_id: String,
    pub harvest_id: String,
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Size the client reported before compressing.
    pub original_size: Option<u64>,
}

/// `{user_id}/{harvest_id}/{timestamp}_{filename}`
pub fn storage_path(user_id: &str, harvest_id: &Uuid, timestamp: i64, filename: &str) -> String {
    format!("{}/{}/{}_{}", user_id, harvest_id, timestamp, filename)
}

/// Accepts compressed originals, stores them and creates the photo record.
/// Variant generation is driven by the caller once this returns.
#[derive(Clone)]
pub struct UploadCoordinator {
    harvest_repo: Arc<dyn HarvestRepository>,
    photo_repo: Arc<dyn PhotoRepository>,
    store: Arc<dyn ObjectStore>,
    clock: Arc<MonotonicClock>,
    limits: UploadLimits,
}

impl UploadCoordinator {
    pub fn new(
        harvest_repo: Arc<dyn HarvestRepository>,
        photo_repo: Arc<dyn PhotoRepository>,
        store: Arc<dyn ObjectStore>,
        limits: UploadLimits,
    ) -> Self {
        UploadCoordinator {
            harvest_repo,
            photo_repo,
            store,
            clock: Arc::new(MonotonicClock::new()),
            limits,
        }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    #[tracing::instrument(
        name = "upload_original",
        skip_all,
        fields(user_id = %request.user_id, harvest_id = %request.harvest_id, bytes = request.bytes.len())
    )]
    pub async fn upload(&self, request: UploadRequest) -> Result<Photo, AppError> {
        let user_id = valid_user_id(&request.user_id)?;
        let harvest_id = valid_uuid(&request.harvest_id, "harvest_id")?;

        if request.bytes.is_empty() {
            return Err(AppError::InvalidInput("Image payload is empty".into()));
        }
        if request.bytes.len() > self.limits.max_file_size {
            return Err(AppError::InvalidInput(format!(
                "Image payload exceeds {} bytes",
                self.limits.max_file_size
            )));
        }
        let filename = sanitize_filename(&request.filename, self.limits.max_filename_length)?;

        self.harvest_repo.get_owned_harvest(&harvest_id, &user_id).await?;

        let mime_type = infer::get(&request.bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or(FALLBACK_MIME_TYPE)
            .to_string();
        let path = storage_path(&user_id, &harvest_id, self.clock.next_millis(), &filename);
        let compressed_size = request.bytes.len() as u64;

        with_timeout(
            self.limits.storage_timeout,
            self.store.create(&path, request.bytes, &mime_type),
        )
        .await
        .map_err(|e| {
            tracing::error!(path = %path, error = %e, "failed to store original");
            match e {
                StorageError::AlreadyExists(_) => AppError::from(e),
                other => AppError::StorageUnavailable(other.to_string()),
            }
        })?;

        let new_photo = NewPhoto::pending(
            harvest_id,
            path,
            filename,
            mime_type,
            compressed_size,
            request.original_size,
        );
        let photo = self.photo_repo.create_photo(&new_photo).await?;

        tracing::info!(photo_id = %photo.id, storage_path = %photo.storage_path, "original stored");
        Ok(photo)
    }
}
