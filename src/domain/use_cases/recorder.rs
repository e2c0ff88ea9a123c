use std::sync::Arc;

use uuid::Uuid;

use crate::{
    entities::{
        photo::{Photo, VariantUpdate},
        photo_metadata::{VariantKind, VariantOutcome},
    },
    errors::AppError,
    repositories::photo::PhotoRepository,
};

/// Persists variant results against a photo record.
///
/// Every write is a merge on one key of the metadata document, so the order
/// in which variants finish and any replays do not matter.
#[derive(Clone)]
pub struct MetadataRecorder {
    photo_repo: Arc<dyn PhotoRepository>,
}

impl MetadataRecorder {
    pub fn new(photo_repo: Arc<dyn PhotoRepository>) -> Self {
        MetadataRecorder { photo_repo }
    }

    /// Records the decoded size of the original.
    pub async fn record_original(&self, photo_id: &Uuid, width: u32, height: u32) -> Result<(), AppError> {
        match self.photo_repo.merge_original_dimensions(photo_id, width, height).await {
            Err(AppError::NotFound(_)) => {
                tracing::info!(%photo_id, "photo removed before dimensions were recorded");
                Ok(())
            }
            other => other,
        }
    }

    /// Merges one variant outcome. Returns `None` when the photo no longer
    /// exists.
    pub async fn record_variant(
        &self,
        photo_id: &Uuid,
        kind: VariantKind,
        outcome: VariantOutcome,
        url: Option<String>,
    ) -> Result<Option<Photo>, AppError> {
        let status = outcome.status_str();
        let update = VariantUpdate { kind, outcome, url };

        match self.photo_repo.merge_variant(photo_id, &update).await {
            Ok(photo) => {
                tracing::debug!(%photo_id, variant = %kind, status, "variant recorded");
                Ok(Some(photo))
            }
            Err(AppError::NotFound(_)) => {
                tracing::info!(%photo_id, variant = %kind, "photo removed before variant was recorded");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
