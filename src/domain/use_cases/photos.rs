use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::{
    entities::{
        delivery::BestAvailable,
        pagination::{Page, PageLimits, PageQuery},
        photo::{AiAnalysisStatus, Photo},
    },
    errors::AppError,
    repositories::{
        harvest::HarvestRepository,
        photo::{photo_not_found, PhotoRepository},
    },
    use_cases::{
        delivery::ProgressiveDelivery,
        upload::{UploadCoordinator, UploadRequest},
        variants::{VariantGenerator, VariantReport},
    },
    utils::valid_uuid::valid_uuid,
};

/// An accepted upload whose variants are still being generated.
pub struct AcceptedUpload {
    pub photo: Photo,
    pub variants: JoinHandle<VariantReport>,
}

/// Photo operations exposed over HTTP.
#[derive(Clone)]
pub struct PhotoHandler {
    pub coordinator: UploadCoordinator,
    pub generator: VariantGenerator,
    pub delivery: ProgressiveDelivery,
    photo_repo: Arc<dyn PhotoRepository>,
    harvest_repo: Arc<dyn HarvestRepository>,
    page_limits: PageLimits,
}

impl PhotoHandler {
    pub fn new(
        coordinator: UploadCoordinator,
        generator: VariantGenerator,
        photo_repo: Arc<dyn PhotoRepository>,
        harvest_repo: Arc<dyn HarvestRepository>,
        page_limits: PageLimits,
    ) -> Self {
        PhotoHandler {
            coordinator,
            generator,
            delivery: ProgressiveDelivery::new(Arc::clone(&photo_repo)),
            photo_repo,
            harvest_repo,
            page_limits,
        }
    }

    /// Stores the original and starts variant generation in the background.
    /// Dropping the returned handle detaches the job.
    pub async fn upload(&self, request: UploadRequest) -> Result<AcceptedUpload, AppError> {
        let photo = self.coordinator.upload(request).await?;

        let generator = self.generator.clone();
        let job_photo = photo.clone();
        let span = tracing::info_span!("variant_job", photo_id = %photo.id);
        let variants = tokio::spawn(async move { generator.generate(&job_photo).await }.instrument(span));

        Ok(AcceptedUpload { photo, variants })
    }

    /// Loads a photo whose harvest belongs to `user_id`. Photos of other
    /// users are reported as missing.
    async fn owned_photo(&self, user_id: &str, id: &str) -> Result<Photo, AppError> {
        let valid_id = valid_uuid(id, "photo_id")?;
        let photo = self.photo_repo.get_photo(&valid_id).await?;
        self.harvest_repo
            .get_owned_harvest(&photo.harvest_id, user_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => photo_not_found(&valid_id),
                other => other,
            })?;
        Ok(photo)
    }

    /// Retrieves a photo by its ID
    pub async fn get_photo(&self, user_id: &str, id: &str) -> Result<Photo, AppError> {
        self.owned_photo(user_id, id).await
    }

    /// Lists one page of a harvest's photos, oldest first
    pub async fn list_photos(&self, user_id: &str, harvest_id: &str, query: &PageQuery) -> Result<Vec<Photo>, AppError> {
        let valid_id = valid_uuid(harvest_id, "harvest_id")?;
        self.harvest_repo.get_owned_harvest(&valid_id, user_id).await?;

        let page = Page::resolve(query, self.page_limits);
        self.photo_repo.list_photos_for_harvest(&valid_id, page).await
    }

    pub async fn best_available(&self, user_id: &str, id: &str) -> Result<BestAvailable, AppError> {
        let photo = self.owned_photo(user_id, id).await?;
        self.delivery.best_available(&photo.id).await
    }

    /// Applies a status reported by the analysis process
    pub async fn update_analysis_status(
        &self,
        user_id: &str,
        id: &str,
        status: AiAnalysisStatus,
    ) -> Result<Photo, AppError> {
        let photo = self.owned_photo(user_id, id).await?;
        let photo = self.photo_repo.transition_analysis_status(&photo.id, status).await?;
        tracing::info!(photo_id = %photo.id, %status, "analysis status updated");
        Ok(photo)
    }
}
