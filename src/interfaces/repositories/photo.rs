use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::{
    entities::{
        pagination::Page,
        photo::{AiAnalysisStatus, NewPhoto, Photo, PhotoRow, VariantUpdate},
    },
    errors::AppError,
    repositories::sqlx_repo::SqlxPhotoRepo,
};

#[async_trait]
pub trait PhotoRepository: Send + Sync {
    async fn check_connection(&self) -> Result<(), AppError>;
    async fn create_photo(&self, photo: &NewPhoto) -> Result<Photo, AppError>;
    async fn get_photo(&self, id: &Uuid) -> Result<Photo, AppError>;

    /// One page of a harvest's photos, oldest first.
    async fn list_photos_for_harvest(&self, harvest_id: &Uuid, page: Page) -> Result<Vec<Photo>, AppError>;

    /// Stores the decoded size of the original under `metadata.original`.
    async fn merge_original_dimensions(&self, id: &Uuid, width: u32, height: u32) -> Result<(), AppError>;

    /// Merges one variant outcome into `metadata.variants` and, for ready
    /// outcomes, sets the matching URL column. Atomic per photo.
    async fn merge_variant(&self, id: &Uuid, update: &VariantUpdate) -> Result<Photo, AppError>;

    /// Moves `ai_analysis_status` to `to` when the current state allows it.
    async fn transition_analysis_status(&self, id: &Uuid, to: AiAnalysisStatus) -> Result<Photo, AppError>;
}

pub(crate) fn illegal_transition(from: AiAnalysisStatus, to: AiAnalysisStatus) -> AppError {
    AppError::InvalidInput(format!("Cannot move analysis status from {} to {}", from, to))
}

pub(crate) fn photo_not_found(id: &Uuid) -> AppError {
    AppError::NotFound(format!("Photo {} not found", id))
}

impl SqlxPhotoRepo {
    pub fn new(pool: PgPool) -> Self {
        SqlxPhotoRepo { pool }
    }
}

#[async_trait]
impl PhotoRepository for SqlxPhotoRepo {
    async fn check_connection(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(AppError::from)
    }

    async fn create_photo(&self, photo: &NewPhoto) -> Result<Photo, AppError> {
        let row = sqlx::query_as::<_, PhotoRow>(
            r#"
            INSERT INTO photos (
                id, harvest_id, storage_path, original_filename, mime_type,
                file_size, metadata, ai_analysis_status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(photo.id)
        .bind(photo.harvest_id)
        .bind(&photo.storage_path)
        .bind(&photo.original_filename)
        .bind(&photo.mime_type)
        .bind(photo.file_size)
        .bind(Json(&photo.metadata))
        .bind(AiAnalysisStatus::Pending.as_str())
        .bind(photo.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                match db_err.constraint() {
                    Some("photos_storage_path_key") => {
                        return AppError::Conflict("Storage path already in use".into());
                    }
                    Some("photos_harvest_id_fkey") => {
                        return AppError::NotFound(format!("Harvest {} not found", photo.harvest_id));
                    }
                    _ => {}
                }
            }
            AppError::from(e)
        })?;

        Photo::try_from(row)
    }

    async fn get_photo(&self, id: &Uuid) -> Result<Photo, AppError> {
        let row = sqlx::query_as::<_, PhotoRow>("SELECT * FROM photos WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| photo_not_found(id))?;

        Photo::try_from(row)
    }

    async fn list_photos_for_harvest(&self, harvest_id: &Uuid, page: Page) -> Result<Vec<Photo>, AppError> {
        let rows = sqlx::query_as::<_, PhotoRow>(
            r#"
            SELECT * FROM photos
            WHERE harvest_id = $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(harvest_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Photo::try_from).collect()
    }

    async fn merge_original_dimensions(&self, id: &Uuid, width: u32, height: u32) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE photos SET metadata = jsonb_set(
                jsonb_set(
                    jsonb_set(metadata, '{original}', COALESCE(metadata->'original', '{}'::jsonb), true),
                    '{original,width}', to_jsonb($2::bigint), true
                ),
                '{original,height}', to_jsonb($3::bigint), true
            )
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(i64::from(width))
        .bind(i64::from(height))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(photo_not_found(id));
        }
        Ok(())
    }

    async fn merge_variant(&self, id: &Uuid, update: &VariantUpdate) -> Result<Photo, AppError> {
        // A failed outcome is discarded when the slot already holds a ready one;
        // URL columns only move for ready outcomes.
        let row = sqlx::query_as::<_, PhotoRow>(
            r#"
            UPDATE photos SET
                metadata = CASE
                    WHEN $3::text = 'failed'
                         AND metadata #>> ARRAY['variants', $2::text, 'status'] = 'ready'
                    THEN metadata
                    ELSE jsonb_set(
                        jsonb_set(metadata, '{variants}', COALESCE(metadata->'variants', '{}'::jsonb), true),
                        ARRAY['variants', $2::text], $4::jsonb, true
                    )
                END,
                thumbnail_url = CASE
                    WHEN $2::text = 'thumbnail' AND $3::text = 'ready' THEN COALESCE($5, thumbnail_url)
                    ELSE thumbnail_url
                END,
                medium_url = CASE
                    WHEN $2::text = 'medium' AND $3::text = 'ready' THEN COALESCE($5, medium_url)
                    ELSE medium_url
                END,
                public_url = CASE
                    WHEN $2::text = 'full' AND $3::text = 'ready' THEN COALESCE($5, public_url)
                    ELSE public_url
                END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.kind.as_str())
        .bind(update.outcome.status_str())
        .bind(Json(&update.outcome))
        .bind(update.url.as_deref())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| photo_not_found(id))?;

        Photo::try_from(row)
    }

    async fn transition_analysis_status(&self, id: &Uuid, to: AiAnalysisStatus) -> Result<Photo, AppError> {
        let allowed_from: Vec<String> = to
            .predecessors()
            .iter()
            .map(|status| status.as_str().to_string())
            .collect();

        let updated = sqlx::query_as::<_, PhotoRow>(
            r#"
            UPDATE photos SET ai_analysis_status = $2
            WHERE id = $1 AND ai_analysis_status = ANY($3)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(to.as_str())
        .bind(&allowed_from)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(row) => Photo::try_from(row),
            None => {
                let current = self.get_photo(id).await?;
                Err(illegal_transition(current.ai_analysis_status, to))
            }
        }
    }
}
