mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;
pub mod shared_repos;
pub mod telemetry;

pub use domain::{entities, use_cases};
pub use interfaces::{handlers, middlewares, repositories, routes};
pub use infrastructure::{db, imaging, limiter, storage, utils, web};

use entities::pagination::PageLimits;
use limiter::rate_limiter::{RateLimiterStore, RateLimits};
use shared_repos::SharedRepositories;
use use_cases::{
    harvest::HarvestHandler,
    photos::PhotoHandler,
    recorder::MetadataRecorder,
    upload::{UploadCoordinator, UploadLimits},
    variants::{VariantGenerator, VariantOptions},
};

pub struct AppState {
    pub harvest_handler: HarvestHandler,
    pub photo_handler: PhotoHandler,
    pub repos: SharedRepositories,
    /// `None` when upload rate limiting is disabled.
    pub upload_limiter: Option<RateLimiterStore>,
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(config: &settings::AppConfig, repos: SharedRepositories) -> Self {
        let harvest_handler = HarvestHandler::new(repos.harvest_repo.clone());

        let coordinator = UploadCoordinator::new(
            repos.harvest_repo.clone(),
            repos.photo_repo.clone(),
            repos.store.clone(),
            UploadLimits::from_config(config),
        );
        let generator = VariantGenerator::new(
            repos.store.clone(),
            MetadataRecorder::new(repos.photo_repo.clone()),
            config.variant_workers,
            VariantOptions::from_config(config),
        );
        let photo_handler = PhotoHandler::new(
            coordinator,
            generator,
            repos.photo_repo.clone(),
            repos.harvest_repo.clone(),
            PageLimits::from_config(config),
        );
        let upload_limiter = config
            .rate_limit_enabled
            .then(|| RateLimiterStore::new(RateLimits::from_config(config)));

        AppState {
            harvest_handler,
            photo_handler,
            repos,
            upload_limiter,
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }
}
