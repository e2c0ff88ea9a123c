//! Record-store tests against a live Postgres. They run when `DATABASE_URL`
//! points at a scratch database and are skipped otherwise.

use plant_journey_backend::{
    db::postgres::{create_pool, run_migrations},
    entities::{
        harvest::{HarvestInsert, NewHarvestRequest},
        pagination::Page,
        photo::{AiAnalysisStatus, NewPhoto, VariantUpdate},
        photo_metadata::{Codec, VariantFailure, VariantKind, VariantOutcome},
    },
    errors::AppError,
    repositories::{
        harvest::HarvestRepository,
        photo::PhotoRepository,
        sqlx_repo::{SqlxHarvestRepo, SqlxPhotoRepo},
    },
};
use uuid::Uuid;

struct PgRepos {
    harvests: SqlxHarvestRepo,
    photos: SqlxPhotoRepo,
}

async fn pg_repos() -> Option<PgRepos> {
    dotenv::dotenv().ok();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres repository test");
        return None;
    };

    let pool = create_pool(&url).await.expect("Failed to connect to Postgres");
    run_migrations(&pool).await.expect("Failed to run migrations");
    Some(PgRepos {
        harvests: SqlxHarvestRepo::new(pool.clone()),
        photos: SqlxPhotoRepo::new(pool),
    })
}

impl PgRepos {
    async fn harvest_for(&self, user_id: &str) -> Uuid {
        let request = NewHarvestRequest {
            plant_variety: "Roma tomato".to_string(),
            quantity: 1.5,
            event_date: None,
            description: None,
            location: None,
        };
        let insert = HarvestInsert::from_request(user_id.to_string(), request).unwrap();
        self.harvests.create_harvest(&insert).await.unwrap().id
    }

    async fn photo_in(&self, harvest_id: Uuid) -> Uuid {
        let path = format!("pg-test/{}/{}_leaf.png", harvest_id, Uuid::new_v4());
        let photo = NewPhoto::pending(harvest_id, path, "leaf.png".into(), "image/png".into(), 64, Some(256));
        self.photos.create_photo(&photo).await.unwrap().id
    }
}

fn ready(kind: VariantKind) -> VariantUpdate {
    VariantUpdate {
        kind,
        outcome: VariantOutcome::Ready {
            width: kind.bound(),
            height: kind.bound(),
            byte_size: 42,
            codec: Codec::Webp,
            path: format!("p_{}.webp", kind),
        },
        url: Some(format!("http://cdn/p_{}.webp", kind)),
    }
}

#[actix_rt::test]
async fn merging_the_same_variant_twice_is_idempotent() {
    let Some(repos) = pg_repos().await else { return };
    let harvest = repos.harvest_for("pg-user").await;
    let id = repos.photo_in(harvest).await;

    let first = repos.photos.merge_variant(&id, &ready(VariantKind::Medium)).await.unwrap();
    let second = repos.photos.merge_variant(&id, &ready(VariantKind::Medium)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.medium_url.as_deref(), Some("http://cdn/p_medium.webp"));
    assert!(second.thumbnail_url.is_none() && second.public_url.is_none());
    assert_eq!(second.metadata.original.original_size, Some(256));
}

#[actix_rt::test]
async fn merge_order_does_not_change_final_row() {
    let Some(repos) = pg_repos().await else { return };
    let harvest = repos.harvest_for("pg-user").await;
    let a = repos.photo_in(harvest).await;
    let b = repos.photo_in(harvest).await;

    for kind in [VariantKind::Full, VariantKind::Thumbnail, VariantKind::Medium] {
        repos.photos.merge_variant(&a, &ready(kind)).await.unwrap();
    }
    for kind in [VariantKind::Thumbnail, VariantKind::Medium, VariantKind::Full] {
        repos.photos.merge_variant(&b, &ready(kind)).await.unwrap();
    }
    repos.photos.merge_original_dimensions(&a, 1200, 900).await.unwrap();
    repos.photos.merge_original_dimensions(&b, 1200, 900).await.unwrap();

    let a = repos.photos.get_photo(&a).await.unwrap();
    let b = repos.photos.get_photo(&b).await.unwrap();
    assert_eq!(a.metadata, b.metadata);
    assert_eq!(
        (&a.thumbnail_url, &a.medium_url, &a.public_url),
        (&b.thumbnail_url, &b.medium_url, &b.public_url)
    );
    assert_eq!(a.metadata.original.width, Some(1200));
}

#[actix_rt::test]
async fn late_failure_keeps_ready_slot() {
    let Some(repos) = pg_repos().await else { return };
    let harvest = repos.harvest_for("pg-user").await;
    let id = repos.photo_in(harvest).await;

    repos.photos.merge_variant(&id, &ready(VariantKind::Full)).await.unwrap();
    let merged = repos
        .photos
        .merge_variant(
            &id,
            &VariantUpdate {
                kind: VariantKind::Full,
                outcome: VariantOutcome::failed(VariantFailure::EncodingFailed, "late retry"),
                url: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(merged.public_url.as_deref(), Some("http://cdn/p_full.webp"));
    assert!(merged.metadata.variant(VariantKind::Full).is_some_and(VariantOutcome::is_ready));

    let failed_first = repos
        .photos
        .merge_variant(
            &id,
            &VariantUpdate {
                kind: VariantKind::Thumbnail,
                outcome: VariantOutcome::failed(VariantFailure::StorageUnavailable, "timeout"),
                url: None,
            },
        )
        .await
        .unwrap();
    assert!(failed_first.thumbnail_url.is_none());
    assert!(failed_first
        .metadata
        .variant(VariantKind::Thumbnail)
        .is_some_and(|outcome| !outcome.is_ready()));
}

#[actix_rt::test]
async fn illegal_analysis_transition_is_rejected() {
    let Some(repos) = pg_repos().await else { return };
    let harvest = repos.harvest_for("pg-user").await;
    let id = repos.photo_in(harvest).await;

    let err = repos
        .photos
        .transition_analysis_status(&id, AiAnalysisStatus::Complete)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    repos.photos.transition_analysis_status(&id, AiAnalysisStatus::Processing).await.unwrap();
    let done = repos
        .photos
        .transition_analysis_status(&id, AiAnalysisStatus::Complete)
        .await
        .unwrap();
    assert_eq!(done.ai_analysis_status, AiAnalysisStatus::Complete);

    let err = repos
        .photos
        .transition_analysis_status(&id, AiAnalysisStatus::Processing)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = repos
        .photos
        .transition_analysis_status(&Uuid::new_v4(), AiAnalysisStatus::Processing)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[actix_rt::test]
async fn photos_page_and_harvests_stay_with_their_owner() {
    let Some(repos) = pg_repos().await else { return };
    let harvest = repos.harvest_for("pg-owner").await;
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(repos.photo_in(harvest).await);
    }

    let page = |page| Page { page, page_size: 2 };
    let first = repos.photos.list_photos_for_harvest(&harvest, page(1)).await.unwrap();
    let second = repos.photos.list_photos_for_harvest(&harvest, page(2)).await.unwrap();
    let listed: Vec<Uuid> = first.iter().chain(second.iter()).map(|p| p.id).collect();
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);
    let mut expected = ids.clone();
    expected.sort();
    let mut sorted = listed.clone();
    sorted.sort();
    assert_eq!(sorted, expected);

    assert!(repos.harvests.get_owned_harvest(&harvest, "pg-owner").await.is_ok());
    assert!(matches!(
        repos.harvests.get_owned_harvest(&harvest, "pg-intruder").await,
        Err(AppError::NotFound(_))
    ));
}

#[actix_rt::test]
async fn duplicate_storage_path_is_a_conflict() {
    let Some(repos) = pg_repos().await else { return };
    let harvest = repos.harvest_for("pg-user").await;
    let path = format!("pg-test/{}/1_dup.png", Uuid::new_v4());
    let photo = |path: &str| NewPhoto::pending(harvest, path.into(), "dup.png".into(), "image/png".into(), 8, None);

    repos.photos.create_photo(&photo(&path)).await.unwrap();
    let err = repos.photos.create_photo(&photo(&path)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}
