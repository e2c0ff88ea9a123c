use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    entities::harvest::{Harvest, HarvestInsert},
    errors::AppError,
    repositories::sqlx_repo::SqlxHarvestRepo,
};

#[async_trait]
pub trait HarvestRepository: Send + Sync {
    async fn check_connection(&self) -> Result<(), AppError>;
    async fn create_harvest(&self, harvest: &HarvestInsert) -> Result<Harvest, AppError>;
    async fn get_harvest(&self, id: &Uuid) -> Result<Harvest, AppError>;

    /// Like `get_harvest`, but a harvest of another user is `NotFound` too.
    async fn get_owned_harvest(&self, id: &Uuid, user_id: &str) -> Result<Harvest, AppError>;
}

pub(crate) fn harvest_not_found(id: &Uuid) -> AppError {
    AppError::NotFound(format!("Harvest {} not found", id))
}

impl SqlxHarvestRepo {
    pub fn new(pool: PgPool) -> Self {
        SqlxHarvestRepo { pool }
    }
}

#[async_trait]
impl HarvestRepository for SqlxHarvestRepo {
    async fn check_connection(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(AppError::from)
    }

    async fn create_harvest(&self, harvest: &HarvestInsert) -> Result<Harvest, AppError> {
        let created = sqlx::query_as::<_, Harvest>(
            r#"
            INSERT INTO harvests (
                id, user_id, plant_variety, quantity, event_date,
                description, location, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(harvest.id)
        .bind(&harvest.user_id)
        .bind(&harvest.plant_variety)
        .bind(harvest.quantity)
        .bind(harvest.event_date)
        .bind(&harvest.description)
        .bind(&harvest.location)
        .bind(harvest.created_at)
        .bind(harvest.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_harvest(&self, id: &Uuid) -> Result<Harvest, AppError> {
        sqlx::query_as::<_, Harvest>("SELECT * FROM harvests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| harvest_not_found(id))
    }

    async fn get_owned_harvest(&self, id: &Uuid, user_id: &str) -> Result<Harvest, AppError> {
        sqlx::query_as::<_, Harvest>("SELECT * FROM harvests WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| harvest_not_found(id))
    }
}
