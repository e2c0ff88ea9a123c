use std::{sync::Arc, time::Duration};

use image::DynamicImage;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::{
    entities::{
        photo::Photo,
        photo_metadata::{Codec, VariantFailure, VariantKind, VariantOutcome},
    },
    imaging::{self, DecodedImage},
    settings::AppConfig,
    storage::{with_timeout, ObjectStore},
    use_cases::recorder::MetadataRecorder,
};

#[derive(Debug, Clone, Copy)]
pub struct VariantOptions {
    /// Try WebP before the source codec.
    pub prefer_modern_codec: bool,
    pub storage_timeout: Duration,
}

impl VariantOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        VariantOptions {
            prefer_modern_codec: config.prefer_modern_codec,
            storage_timeout: config.storage_timeout(),
        }
    }
}

/// What happened to each variant of one photo, in completion order.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantReport {
    pub photo_id: Uuid,
    pub outcomes: Vec<(VariantKind, VariantOutcome)>,
}

impl VariantReport {
    pub fn outcome(&self, kind: VariantKind) -> Option<&VariantOutcome> {
        self.outcomes.iter().find(|(k, _)| *k == kind).map(|(_, o)| o)
    }

    pub fn ready(&self) -> Vec<VariantKind> {
        self.outcomes.iter().filter(|(_, o)| o.is_ready()).map(|(k, _)| *k).collect()
    }

    pub fn failed(&self) -> Vec<VariantKind> {
        self.outcomes.iter().filter(|(_, o)| !o.is_ready()).map(|(k, _)| *k).collect()
    }
}

/// Derived objects sit beside the original: `a/b/17_leaf.jpg` becomes
/// `a/b/17_leaf_thumbnail.webp`.
pub fn derived_path(storage_path: &str, kind: VariantKind, codec: Codec) -> String {
    let (dir, file) = match storage_path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, storage_path),
    };
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    let name = format!("{}_{}.{}", stem, kind, codec.extension());
    match dir {
        Some(dir) => format!("{}/{}", dir, name),
        None => name,
    }
}

/// Derives the thumbnail, medium and full renditions of stored originals.
///
/// The thumbnail is rendered and published first; medium and full follow
/// concurrently. CPU-bound work runs on the blocking pool and is bounded by a
/// semaphore shared across all photos.
#[derive(Clone)]
pub struct VariantGenerator {
    store: Arc<dyn ObjectStore>,
    recorder: MetadataRecorder,
    workers: Arc<Semaphore>,
    worker_limit: usize,
    options: VariantOptions,
}

impl VariantGenerator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        recorder: MetadataRecorder,
        workers: usize,
        options: VariantOptions,
    ) -> Self {
        let worker_limit = workers.max(1);
        VariantGenerator {
            store,
            recorder,
            workers: Arc::new(Semaphore::new(worker_limit)),
            worker_limit,
            options,
        }
    }

    pub fn worker_limit(&self) -> usize {
        self.worker_limit
    }

    /// Render slots not currently held by a decode or encode.
    pub fn idle_workers(&self) -> usize {
        self.workers.available_permits()
    }

    pub fn options(&self) -> &VariantOptions {
        &self.options
    }

    #[tracing::instrument(name = "generate_variants", skip_all, fields(photo_id = %photo.id))]
    pub async fn generate(&self, photo: &Photo) -> VariantReport {
        let original = match with_timeout(self.options.storage_timeout, self.store.get(&photo.storage_path)).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %photo.storage_path, error = %e, "original could not be fetched");
                return self
                    .fail_all(photo, VariantFailure::StorageUnavailable, e.to_string())
                    .await;
            }
        };

        let decoded = match self.decode(original).await {
            Ok(decoded) => decoded,
            Err(reason) => {
                tracing::warn!(path = %photo.storage_path, %reason, "original is not a readable image");
                return self.fail_all(photo, VariantFailure::UnsupportedFormat, reason).await;
            }
        };

        let source_codec = decoded.codec;
        let image = Arc::new(decoded.image);
        if let Err(e) = self
            .recorder
            .record_original(&photo.id, image.width(), image.height())
            .await
        {
            tracing::error!(error = %e, "failed to record original dimensions");
        }

        let mut outcomes = Vec::with_capacity(VariantKind::ALL.len());
        let thumbnail = self
            .publish(photo, VariantKind::Thumbnail, Arc::clone(&image), source_codec)
            .await;
        outcomes.push((VariantKind::Thumbnail, thumbnail));

        let (medium, full) = futures::join!(
            self.publish(photo, VariantKind::Medium, Arc::clone(&image), source_codec),
            self.publish(photo, VariantKind::Full, Arc::clone(&image), source_codec),
        );
        outcomes.push((VariantKind::Medium, medium));
        outcomes.push((VariantKind::Full, full));

        let report = VariantReport { photo_id: photo.id, outcomes };
        tracing::info!(ready = ?report.ready(), failed = ?report.failed(), "variant generation finished");
        report
    }

    async fn decode(&self, bytes: Vec<u8>) -> Result<DecodedImage, String> {
        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|e| e.to_string())?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            imaging::decode(&bytes)
        })
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
    }

    /// Renders, stores and records one variant. Never fails the photo: any
    /// error becomes a recorded `Failed` outcome.
    async fn publish(
        &self,
        photo: &Photo,
        kind: VariantKind,
        image: Arc<DynamicImage>,
        source_codec: Option<Codec>,
    ) -> VariantOutcome {
        let (outcome, url) = match self.render_and_store(photo, kind, image, source_codec).await {
            Ok((outcome, url)) => (outcome, Some(url)),
            Err(outcome) => {
                tracing::warn!(variant = %kind, outcome = ?outcome, "variant failed");
                (outcome, None)
            }
        };

        if let Err(e) = self
            .recorder
            .record_variant(&photo.id, kind, outcome.clone(), url)
            .await
        {
            tracing::error!(variant = %kind, error = %e, "failed to record variant");
        }
        outcome
    }

    async fn render_and_store(
        &self,
        photo: &Photo,
        kind: VariantKind,
        image: Arc<DynamicImage>,
        source_codec: Option<Codec>,
    ) -> Result<(VariantOutcome, String), VariantOutcome> {
        let encoding_failed = |reason: String| VariantOutcome::failed(VariantFailure::EncodingFailed, reason);

        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|e| encoding_failed(e.to_string()))?;
        let prefer_modern = self.options.prefer_modern_codec;
        let encoded = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            imaging::render_variant(&image, kind.bound(), source_codec, prefer_modern)
        })
        .await
        .map_err(|e| encoding_failed(e.to_string()))?
        .map_err(|e| encoding_failed(e.to_string()))?;

        let path = derived_path(&photo.storage_path, kind, encoded.codec);
        let byte_size = encoded.bytes.len() as u64;
        let url = with_timeout(
            self.options.storage_timeout,
            self.store.put(&path, encoded.bytes, encoded.codec.mime_type()),
        )
        .await
        .map_err(|e| VariantOutcome::failed(VariantFailure::StorageUnavailable, e.to_string()))?;

        tracing::debug!(variant = %kind, %path, width = encoded.width, height = encoded.height, "variant stored");
        let outcome = VariantOutcome::Ready {
            width: encoded.width,
            height: encoded.height,
            byte_size,
            codec: encoded.codec,
            path,
        };
        Ok((outcome, url))
    }

    async fn fail_all(&self, photo: &Photo, error: VariantFailure, reason: String) -> VariantReport {
        let mut outcomes = Vec::with_capacity(VariantKind::ALL.len());
        for kind in VariantKind::ALL {
            let outcome = VariantOutcome::failed(error, reason.clone());
            if let Err(e) = self
                .recorder
                .record_variant(&photo.id, kind, outcome.clone(), None)
                .await
            {
                tracing::error!(variant = %kind, error = %e, "failed to record variant");
            }
            outcomes.push((kind, outcome));
        }
        VariantReport { photo_id: photo.id, outcomes }
    }
}
