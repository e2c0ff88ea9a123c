use std::sync::Arc;

use uuid::Uuid;

use crate::{
    entities::delivery::BestAvailable,
    errors::AppError,
    repositories::photo::PhotoRepository,
};

/// Read side of the pipeline: answers with whatever rendition exists now.
#[derive(Clone)]
pub struct ProgressiveDelivery {
    photo_repo: Arc<dyn PhotoRepository>,
}

impl ProgressiveDelivery {
    pub fn new(photo_repo: Arc<dyn PhotoRepository>) -> Self {
        ProgressiveDelivery { photo_repo }
    }

    /// Best URL recorded so far; `NotReady` until the first variant lands.
    pub async fn best_available(&self, photo_id: &Uuid) -> Result<BestAvailable, AppError> {
        let photo = self.photo_repo.get_photo(photo_id).await?;
        BestAvailable::from_photo(&photo).ok_or(AppError::NotReady(photo.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entities::{
            photo::{NewPhoto, VariantUpdate},
            photo_metadata::{Codec, VariantFailure, VariantKind, VariantOutcome},
        },
        repositories::memory::MemoryPhotoRepo,
    };

    fn ready(kind: VariantKind) -> VariantUpdate {
        VariantUpdate {
            kind,
            outcome: VariantOutcome::Ready {
                width: kind.bound(),
                height: kind.bound(),
                byte_size: 1,
                codec: Codec::Png,
                path: format!("p_{}.png", kind),
            },
            url: Some(format!("http://cdn/p_{}.png", kind)),
        }
    }

    #[tokio::test]
    async fn not_ready_until_first_variant() {
        let repo = MemoryPhotoRepo::new();
        let photo = repo
            .create_photo(&NewPhoto::pending(Uuid::new_v4(), "u/h/1_a.png".into(), "a.png".into(), "image/png".into(), 5, None))
            .await
            .unwrap();
        let delivery = ProgressiveDelivery::new(Arc::new(repo.clone()));

        assert!(matches!(delivery.best_available(&photo.id).await, Err(AppError::NotReady(id)) if id == photo.id));

        repo.merge_variant(&photo.id, &ready(VariantKind::Thumbnail)).await.unwrap();
        let best = delivery.best_available(&photo.id).await.unwrap();
        assert_eq!(best.variant, VariantKind::Thumbnail);
        assert!(!best.is_final);

        repo.merge_variant(&photo.id, &ready(VariantKind::Medium)).await.unwrap();
        repo.merge_variant(
            &photo.id,
            &VariantUpdate {
                kind: VariantKind::Full,
                outcome: VariantOutcome::failed(VariantFailure::EncodingFailed, "boom"),
                url: None,
            },
        )
        .await
        .unwrap();

        let best = delivery.best_available(&photo.id).await.unwrap();
        assert_eq!(best.variant, VariantKind::Medium);
        assert_eq!(best.url, "http://cdn/p_medium.png");
        assert_eq!(best.failed, vec![VariantKind::Full]);
        assert!(best.is_final);
    }

    #[tokio::test]
    async fn unknown_photo_is_not_found() {
        let delivery = ProgressiveDelivery::new(Arc::new(MemoryPhotoRepo::new()));
        assert!(matches!(delivery.best_available(&Uuid::new_v4()).await, Err(AppError::NotFound(_))));
    }
}
