use std::sync::Arc;

use crate::{
    entities::harvest::{Harvest, HarvestInsert, NewHarvestRequest},
    errors::AppError,
    repositories::harvest::HarvestRepository,
    utils::valid_uuid::valid_uuid,
};

#[derive(Clone)]
pub struct HarvestHandler {
    pub harvest_repo: Arc<dyn HarvestRepository>,
}

impl HarvestHandler {
    pub fn new(harvest_repo: Arc<dyn HarvestRepository>) -> Self {
        HarvestHandler { harvest_repo }
    }

    /// Creates a harvest owned by `user_id`
    pub async fn create_harvest(&self, user_id: &str, request: NewHarvestRequest) -> Result<Harvest, AppError> {
        let insert = HarvestInsert::from_request(user_id.to_string(), request)?;
        let harvest = self.harvest_repo.create_harvest(&insert).await?;
        tracing::info!(harvest_id = %harvest.id, user_id, "harvest created");
        Ok(harvest)
    }

    /// Retrieves one of `user_id`'s harvests; other users' harvests are not found
    pub async fn get_harvest(&self, user_id: &str, id: &str) -> Result<Harvest, AppError> {
        let valid_id = valid_uuid(id, "harvest_id")?;
        self.harvest_repo.get_owned_harvest(&valid_id, user_id).await
    }
}
