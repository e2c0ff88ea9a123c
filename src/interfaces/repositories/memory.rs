//! Process-local record stores with the same semantics as the Postgres ones.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use uuid::Uuid;

use crate::{
    entities::{
        harvest::{Harvest, HarvestInsert},
        pagination::Page,
        photo::{AiAnalysisStatus, NewPhoto, Photo, VariantUpdate},
    },
    errors::AppError,
    repositories::{
        harvest::{harvest_not_found, HarvestRepository},
        photo::{illegal_transition, photo_not_found, PhotoRepository},
    },
};

#[derive(Clone, Default)]
pub struct MemoryHarvestRepo {
    harvests: Arc<DashMap<Uuid, Harvest>>,
}

impl MemoryHarvestRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HarvestRepository for MemoryHarvestRepo {
    async fn check_connection(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_harvest(&self, harvest: &HarvestInsert) -> Result<Harvest, AppError> {
        match self.harvests.entry(harvest.id) {
            Entry::Occupied(_) => Err(AppError::Conflict("Harvest already exists".into())),
            Entry::Vacant(slot) => Ok(slot.insert(harvest.clone().into_harvest()).value().clone()),
        }
    }

    async fn get_harvest(&self, id: &Uuid) -> Result<Harvest, AppError> {
        self.harvests
            .get(id)
            .map(|h| h.value().clone())
            .ok_or_else(|| harvest_not_found(id))
    }

    async fn get_owned_harvest(&self, id: &Uuid, user_id: &str) -> Result<Harvest, AppError> {
        self.harvests
            .get(id)
            .filter(|h| h.user_id == user_id)
            .map(|h| h.value().clone())
            .ok_or_else(|| harvest_not_found(id))
    }
}

/// Photos keyed by id, plus a path index standing in for the UNIQUE
/// constraint on `storage_path`.
#[derive(Clone, Default)]
pub struct MemoryPhotoRepo {
    photos: Arc<DashMap<Uuid, Photo>>,
    paths: Arc<DashMap<String, Uuid>>,
}

impl MemoryPhotoRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops a photo, as a cascading harvest delete would.
    pub fn remove(&self, id: &Uuid) -> Option<Photo> {
        let (_, photo) = self.photos.remove(id)?;
        self.paths.remove(&photo.storage_path);
        Some(photo)
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }
}

#[async_trait]
impl PhotoRepository for MemoryPhotoRepo {
    async fn check_connection(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_photo(&self, photo: &NewPhoto) -> Result<Photo, AppError> {
        match self.paths.entry(photo.storage_path.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict("Storage path already in use".into())),
            Entry::Vacant(slot) => {
                slot.insert(photo.id);
                let created = photo.clone().into_photo();
                self.photos.insert(created.id, created.clone());
                Ok(created)
            }
        }
    }

    async fn get_photo(&self, id: &Uuid) -> Result<Photo, AppError> {
        self.photos
            .get(id)
            .map(|p| p.value().clone())
            .ok_or_else(|| photo_not_found(id))
    }

    async fn list_photos_for_harvest(&self, harvest_id: &Uuid, page: Page) -> Result<Vec<Photo>, AppError> {
        let mut photos: Vec<Photo> = self
            .photos
            .iter()
            .filter(|p| p.harvest_id == *harvest_id)
            .map(|p| p.value().clone())
            .collect();
        photos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(photos
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn merge_original_dimensions(&self, id: &Uuid, width: u32, height: u32) -> Result<(), AppError> {
        let mut photo = self.photos.get_mut(id).ok_or_else(|| photo_not_found(id))?;
        photo.metadata.merge_original_dimensions(width, height);
        Ok(())
    }

    async fn merge_variant(&self, id: &Uuid, update: &VariantUpdate) -> Result<Photo, AppError> {
        // The entry guard serializes concurrent merges on the same photo.
        let mut photo = self.photos.get_mut(id).ok_or_else(|| photo_not_found(id))?;
        photo.apply_variant(update);
        Ok(photo.value().clone())
    }

    async fn transition_analysis_status(&self, id: &Uuid, to: AiAnalysisStatus) -> Result<Photo, AppError> {
        let mut photo = self.photos.get_mut(id).ok_or_else(|| photo_not_found(id))?;
        if !photo.ai_analysis_status.can_transition_to(to) {
            return Err(illegal_transition(photo.ai_analysis_status, to));
        }
        photo.ai_analysis_status = to;
        Ok(photo.value().clone())
    }
}
