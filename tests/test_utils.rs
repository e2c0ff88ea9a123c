#![allow(dead_code)]

use actix_web::{middleware::NormalizePath, web, App, HttpServer};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use plant_journey_backend::{
    constants::USER_ID_HEADER,
    entities::{harvest::{Harvest, HarvestInsert, NewHarvestRequest}, photo::Photo},
    errors::StorageError,
    repositories::{
        harvest::HarvestRepository,
        memory::{MemoryHarvestRepo, MemoryPhotoRepo},
    },
    routes::configure_routes,
    settings::{AppConfig, AppEnvironment, RecordStoreKind, StorageBackendKind},
    shared_repos::SharedRepositories,
    storage::{MemoryObjectStore, ObjectStore},
    AppState,
};
use reqwest::{multipart, Client};
use std::{io::Cursor, net::TcpListener, sync::Arc, time::Duration};
use uuid::Uuid;

pub const TEST_USER: &str = "userA";
pub const PUBLIC_BASE_URL: &str = "http://cdn.test/storage";

pub fn test_config() -> AppConfig {
    AppConfig {
        env: AppEnvironment::Testing,
        name: "Plant Journey Test".to_string(),
        port: 0,
        host: "127.0.0.1".to_string(),
        worker_count: 1,
        record_store: RecordStoreKind::Memory,
        database_url: String::new(),
        storage_backend: StorageBackendKind::Memory,
        supabase_url: String::new(),
        supabase_service_key: String::new(),
        storage_bucket: "event-images".to_string(),
        public_base_url: PUBLIC_BASE_URL.to_string(),
        cors_allowed_origins: vec!["http://localhost:3000".to_string()],
        cors_allow_credentials: true,
        max_file_size: 2 * 1024 * 1024,
        max_filename_length: 255,
        storage_timeout_secs: 2,
        variant_workers: 2,
        prefer_modern_codec: true,
        default_page_size: 20,
        max_page_size: 100,
        rate_limit_enabled: false,
        rate_limit_requests_per_minute: 60,
        rate_limit_burst_limit: 10,
        trust_forwarded_for: false,
        log_level: "debug".to_string(),
        json_logs: false,
    }
}

/// Solid-colour image encoded with `format`.
pub fn sample_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([34, 139, 34])));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format).expect("Failed to encode sample image");
    buffer.into_inner()
}

pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    sample_image(width, height, ImageFormat::Png)
}

pub fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    sample_image(width, height, ImageFormat::Jpeg)
}

pub fn harvest_request(variety: &str) -> NewHarvestRequest {
    NewHarvestRequest {
        plant_variety: variety.to_string(),
        quantity: 2.0,
        event_date: None,
        description: Some("Morning pick".to_string()),
        location: None,
    }
}

/// Use-case level fixture over in-memory backends.
pub struct Pipeline {
    pub state: AppState,
    pub harvests: MemoryHarvestRepo,
    pub photos: MemoryPhotoRepo,
    pub config: AppConfig,
}

impl Pipeline {
    pub fn with_store(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_store_and_config(store, test_config())
    }

    pub fn with_store_and_config(store: Arc<dyn ObjectStore>, config: AppConfig) -> Self {
        let harvests = MemoryHarvestRepo::new();
        let photos = MemoryPhotoRepo::new();
        let repos = SharedRepositories::new(
            Arc::new(harvests.clone()),
            Arc::new(photos.clone()),
            store,
        );
        let state = AppState::new(&config, repos);

        Pipeline { state, harvests, photos, config }
    }

    pub fn in_memory() -> (Self, MemoryObjectStore) {
        let store = MemoryObjectStore::new(PUBLIC_BASE_URL);
        (Self::with_store(Arc::new(store.clone())), store)
    }

    pub async fn harvest_for(&self, user_id: &str) -> Harvest {
        let insert = HarvestInsert::from_request(user_id.to_string(), harvest_request("Basil"))
            .expect("valid harvest");
        self.harvests.create_harvest(&insert).await.expect("Failed to insert harvest")
    }
}

/// Object store that fails or stalls writes whose path matches a pattern.
#[derive(Clone)]
pub struct FaultyStore {
    pub inner: MemoryObjectStore,
    pub fail_paths_containing: Option<&'static str>,
    pub stall_paths_containing: Option<(&'static str, Duration)>,
}

impl FaultyStore {
    async fn inject(&self, path: &str) -> Result<(), StorageError> {
        if let Some(pattern) = self.fail_paths_containing {
            if path.contains(pattern) {
                return Err(StorageError::Unavailable("injected failure".into()));
            }
        }
        if let Some((pattern, delay)) = self.stall_paths_containing {
            if path.contains(pattern) {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }

    pub fn failing(pattern: &'static str) -> Self {
        FaultyStore {
            inner: MemoryObjectStore::new(PUBLIC_BASE_URL),
            fail_paths_containing: Some(pattern),
            stall_paths_containing: None,
        }
    }

    pub fn stalling(pattern: &'static str, delay: Duration) -> Self {
        FaultyStore {
            inner: MemoryObjectStore::new(PUBLIC_BASE_URL),
            fail_paths_containing: None,
            stall_paths_containing: Some((pattern, delay)),
        }
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        self.inject(path).await?;
        self.inner.put(path, bytes, content_type).await
    }

    async fn create(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        self.inject(path).await?;
        self.inner.create(path, bytes, content_type).await
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get(path).await
    }

    fn public_url(&self, path: &str) -> String {
        self.inner.public_url(path)
    }

    async fn check(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}

/// The real server on an ephemeral port, backed by in-memory stores.
pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub config: AppConfig,
    pub store: MemoryObjectStore,
    pub state: web::Data<AppState>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(test_config()).await
    }

    pub async fn spawn_with_config(config: AppConfig) -> Self {
        let store = MemoryObjectStore::new(PUBLIC_BASE_URL);
        let repos = SharedRepositories::in_memory(Arc::new(store.clone()));
        let state = web::Data::new(AppState::new(&config, repos));

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        let server_state = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(server_state.clone())
                .wrap(NormalizePath::trim())
                .configure(configure_routes)
        })
        .listen(listener)
        .expect("Failed to bind server")
        .workers(config.worker_count)
        .run();

        actix_rt::spawn(server);

        let client = Client::new();
        while client.get(format!("{}/api/v1/health", address)).send().await.is_err() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        Self { address, client, config, store, state }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// GET on behalf of `user_id`.
    pub fn get_as(&self, user_id: &str, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).header(USER_ID_HEADER, user_id)
    }

    pub fn patch_as(&self, user_id: &str, path: &str) -> reqwest::RequestBuilder {
        self.client.patch(self.url(path)).header(USER_ID_HEADER, user_id)
    }
}

#[async_trait]
pub trait PhotoTestHelpers: Send + Sync {
    async fn create_harvest(&self, user_id: &str) -> Harvest;
    async fn upload(&self, user_id: &str, harvest_id: &Uuid, filename: &str, bytes: Vec<u8>) -> reqwest::Response;
    async fn wait_for_variants(&self, photo_id: &Uuid) -> Photo;
}

#[async_trait]
impl PhotoTestHelpers for TestApp {
    async fn create_harvest(&self, user_id: &str) -> Harvest {
        let response = self
            .client
            .post(self.url("/api/v1/harvests"))
            .header(USER_ID_HEADER, user_id)
            .json(&harvest_request("Roma tomato"))
            .send()
            .await
            .expect("Failed to create harvest");

        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        response.json().await.expect("Failed to parse harvest")
    }

    async fn upload(&self, user_id: &str, harvest_id: &Uuid, filename: &str, bytes: Vec<u8>) -> reqwest::Response {
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new()
            .part("file", part)
            .text("original_size", "2000000");

        self.client
            .post(self.url(&format!("/api/v1/harvests/{}/photos", harvest_id)))
            .header(USER_ID_HEADER, user_id)
            .multipart(form)
            .send()
            .await
            .expect("Failed to upload photo")
    }

    /// Polls until every variant has an outcome recorded.
    async fn wait_for_variants(&self, photo_id: &Uuid) -> Photo {
        for _ in 0..500 {
            let photo: Photo = self
                .state
                .photo_handler
                .get_photo(TEST_USER, &photo_id.to_string())
                .await
                .expect("photo exists");
            let variants = &photo.metadata.variants;
            if variants.thumbnail.is_some() && variants.medium.is_some() && variants.full.is_some() {
                return photo;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("variants for {} never completed", photo_id);
    }
}
