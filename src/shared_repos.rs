use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use crate::{
    db::postgres::{create_pool, run_migrations},
    repositories::{
        harvest::HarvestRepository,
        memory::{MemoryHarvestRepo, MemoryPhotoRepo},
        photo::PhotoRepository,
        sqlx_repo::{SqlxHarvestRepo, SqlxPhotoRepo},
    },
    settings::{AppConfig, RecordStoreKind, StorageBackendKind},
    storage::{MemoryObjectStore, ObjectStore, SupabaseStorage},
};

/// Record stores and the object store, chosen once at start-up.
#[derive(Clone)]
pub struct SharedRepositories {
    pub harvest_repo: Arc<dyn HarvestRepository>,
    pub photo_repo: Arc<dyn PhotoRepository>,
    pub store: Arc<dyn ObjectStore>,
}

impl SharedRepositories {
    pub fn new(
        harvest_repo: Arc<dyn HarvestRepository>,
        photo_repo: Arc<dyn PhotoRepository>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        SharedRepositories {
            harvest_repo,
            photo_repo,
            store,
        }
    }

    pub fn postgres(pool: PgPool, store: Arc<dyn ObjectStore>) -> Self {
        let harvest_repo = SqlxHarvestRepo::new(pool.clone());
        let photo_repo = SqlxPhotoRepo::new(pool);

        Self::new(Arc::new(harvest_repo), Arc::new(photo_repo), store)
    }

    pub fn in_memory(store: Arc<dyn ObjectStore>) -> Self {
        Self::new(
            Arc::new(MemoryHarvestRepo::new()),
            Arc::new(MemoryPhotoRepo::new()),
            store,
        )
    }

    /// Connects the backends selected by `config`, running migrations when
    /// Postgres is in use.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn ObjectStore> = match config.storage_backend {
            StorageBackendKind::Supabase => Arc::new(
                SupabaseStorage::new(config).context("Failed to build Supabase storage client")?,
            ),
            StorageBackendKind::Memory => {
                tracing::warn!("Using in-memory object storage; uploads are lost on restart");
                Arc::new(MemoryObjectStore::new(config.public_base_url.clone()))
            }
        };

        match config.record_store {
            RecordStoreKind::Postgres => {
                let pool = create_pool(&config.database_url)
                    .await
                    .context("Failed to create database connection pool")?;
                run_migrations(&pool)
                    .await
                    .context("Failed to run database migrations")?;
                Ok(Self::postgres(pool, store))
            }
            RecordStoreKind::Memory => {
                tracing::warn!("Using in-memory record store; records are lost on restart");
                Ok(Self::in_memory(store))
            }
        }
    }
}
