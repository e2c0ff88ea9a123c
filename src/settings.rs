use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use dotenv::dotenv;
use std::{env, fmt, str::FromStr, time::Duration};
use zeroize::Zeroizing;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    Development,
    Production,
    Testing,
}

impl FromStr for AppEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(AppEnvironment::Development),
            "production" => Ok(AppEnvironment::Production),
            "testing" => Ok(AppEnvironment::Testing),
            _ => Err(ConfigError::Message(format!("Invalid environment: {}", s))),
        }
    }
}

/// Where Photo and harvest rows live.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RecordStoreKind {
    Postgres,
    Memory,
}

/// Where image bytes live.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    Supabase,
    Memory,
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    #[serde(default = "default_env")]
    pub env: AppEnvironment,

    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_record_store")]
    pub record_store: RecordStoreKind,

    #[serde(default)]
    pub database_url: String,

    #[serde(default = "default_storage_backend")]
    pub storage_backend: StorageBackendKind,

    #[serde(default)]
    pub supabase_url: String,

    #[serde(default)]
    pub supabase_service_key: String,

    #[serde(default = "default_storage_bucket")]
    pub storage_bucket: String,

    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default = "default_true")]
    pub cors_allow_credentials: bool,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,

    #[serde(default = "default_max_filename_length")]
    pub max_filename_length: usize,

    #[serde(default = "default_storage_timeout")]
    pub storage_timeout_secs: u64,

    #[serde(default = "default_worker_count")]
    pub variant_workers: usize,

    #[serde(default = "default_true")]
    pub prefer_modern_codec: bool,

    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    #[serde(default = "default_true")]
    pub rate_limit_enabled: bool,

    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_requests_per_minute: u32,

    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst_limit: u32,

    #[serde(default)]
    pub trust_forwarded_for: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub json_logs: bool,
}

fn default_env() -> AppEnvironment {
    AppEnvironment::Development
}
fn default_name() -> String {
    "Plant-Journey-API".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_worker_count() -> usize {
    num_cpus::get()
}
fn default_record_store() -> RecordStoreKind {
    RecordStoreKind::Postgres
}
fn default_storage_backend() -> StorageBackendKind {
    StorageBackendKind::Supabase
}
fn default_storage_bucket() -> String {
    "event-images".to_string()
}
fn default_public_base_url() -> String {
    "http://localhost:8000/storage".to_string()
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}
fn default_true() -> bool {
    true
}
fn default_max_file_size() -> usize {
    10 * 1024 * 1024
}
fn default_max_filename_length() -> usize {
    255
}
fn default_storage_timeout() -> u64 {
    10
}
fn default_page_size() -> u32 {
    20
}
fn default_max_page_size() -> u32 {
    100
}
fn default_rate_limit_per_minute() -> u32 {
    60
}
fn default_rate_limit_burst() -> u32 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        dotenv().ok();

        let raw_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let env_name = AppEnvironment::from_str(&raw_env)
            .map_err(|_| ConfigError::Message(format!("Invalid APP_ENV value: {}", raw_env)))?;

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env_name)).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors_allowed_origins")
                    .try_parsing(true)
                    .ignore_empty(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        config.env = env_name;

        if config.record_store == RecordStoreKind::Postgres {
            config.database_url = fill_or_env(config.database_url, "DATABASE_URL")?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.record_store == RecordStoreKind::Postgres && self.database_url.trim().is_empty() {
            errors.push("DATABASE_URL cannot be empty".to_string());
        }
        if self.storage_backend == StorageBackendKind::Supabase {
            if url::Url::parse(&self.supabase_url).is_err() {
                errors.push("SUPABASE_URL must be a valid URL".to_string());
            }
            if self.supabase_service_key.trim().is_empty() {
                errors.push("SUPABASE_SERVICE_KEY must be set".to_string());
            }
        }
        if self.storage_bucket.trim().is_empty() {
            errors.push("STORAGE_BUCKET cannot be empty".to_string());
        }
        if self.max_file_size == 0 {
            errors.push("MAX_FILE_SIZE must be positive".to_string());
        }
        if self.storage_timeout_secs == 0 {
            errors.push("STORAGE_TIMEOUT_SECS must be positive".to_string());
        }
        if self.variant_workers == 0 {
            errors.push("VARIANT_WORKERS must be positive".to_string());
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            errors.push("DEFAULT_PAGE_SIZE must be between 1 and MAX_PAGE_SIZE".to_string());
        }
        if self.rate_limit_enabled
            && (self.rate_limit_requests_per_minute == 0 || self.rate_limit_burst_limit == 0)
        {
            errors.push("Rate limits must be positive when rate limiting is enabled".to_string());
        }
        if self.is_production() {
            if self.cors_origins().iter().any(|o| o == "*") {
                errors.push("Wildcard CORS (*) is not allowed in production".to_string());
            }
            if self.record_store == RecordStoreKind::Memory
                || self.storage_backend == StorageBackendKind::Memory
            {
                errors.push("In-memory backends are not allowed in production".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Message(errors.join(", ")))
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == AppEnvironment::Production
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .iter()
            .flat_map(|origin| origin.split(','))
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }

    pub fn service_key(&self) -> Zeroizing<String> {
        Zeroizing::new(self.supabase_service_key.clone())
    }
}

fn fill_or_env(current: String, env_key: &str) -> Result<String, ConfigError> {
    if current.trim().is_empty() {
        env::var(env_key).map_err(|_| ConfigError::Message(format!("{env_key} must be set")))
    } else {
        Ok(current)
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Production => "production",
            AppEnvironment::Testing => "testing",
        };
        write!(f, "{s}")
    }
}

trait Redact {
    fn redact(&self) -> &str;
}

impl Redact for str {
    fn redact(&self) -> &str {
        if self.is_empty() {
            "[MISSING]"
        } else {
            "[REDACTED]"
        }
    }
}

impl Redact for String {
    fn redact(&self) -> &str {
        self.as_str().redact()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("name", &self.name)
            .field("port", &self.port)
            .field("host", &self.host)
            .field("worker_count", &self.worker_count)
            .field("record_store", &self.record_store)
            .field("database_url", &self.database_url.redact())
            .field("storage_backend", &self.storage_backend)
            .field("supabase_url", &self.supabase_url)
            .field("supabase_service_key", &self.supabase_service_key.redact())
            .field("storage_bucket", &self.storage_bucket)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("max_file_size", &self.max_file_size)
            .field("storage_timeout_secs", &self.storage_timeout_secs)
            .field("variant_workers", &self.variant_workers)
            .field("prefer_modern_codec", &self.prefer_modern_codec)
            .field("default_page_size", &self.default_page_size)
            .field("max_page_size", &self.max_page_size)
            .field("rate_limit_enabled", &self.rate_limit_enabled)
            .field("rate_limit_requests_per_minute", &self.rate_limit_requests_per_minute)
            .field("rate_limit_burst_limit", &self.rate_limit_burst_limit)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .field("log_level", &self.log_level)
            .field("json_logs", &self.json_logs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            env: AppEnvironment::Testing,
            name: "test".into(),
            port: 0,
            host: "127.0.0.1".into(),
            worker_count: 1,
            record_store: RecordStoreKind::Memory,
            database_url: String::new(),
            storage_backend: StorageBackendKind::Memory,
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            storage_bucket: "event-images".into(),
            public_base_url: "http://localhost/storage".into(),
            cors_allowed_origins: vec!["http://localhost:3000, https://*.vercel.app/".into()],
            cors_allow_credentials: true,
            max_file_size: 1024,
            max_filename_length: 255,
            storage_timeout_secs: 1,
            variant_workers: 2,
            prefer_modern_codec: true,
            default_page_size: 20,
            max_page_size: 100,
            rate_limit_enabled: true,
            rate_limit_requests_per_minute: 60,
            rate_limit_burst_limit: 10,
            trust_forwarded_for: false,
            log_level: "debug".into(),
            json_logs: false,
        }
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let config = base_config();
        assert_eq!(
            config.cors_origins(),
            vec!["http://localhost:3000".to_string(), "https://*.vercel.app".to_string()]
        );
    }

    #[test]
    fn memory_backends_pass_outside_production() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn production_rejects_memory_backends_and_wildcard_cors() {
        let mut config = base_config();
        config.env = AppEnvironment::Production;
        config.cors_allowed_origins = vec!["*".into()];

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Wildcard CORS"));
        assert!(err.contains("In-memory backends"));
    }

    #[test]
    fn supabase_backend_requires_url_and_key() {
        let mut config = base_config();
        config.storage_backend = StorageBackendKind::Supabase;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("SUPABASE_URL"));
        assert!(err.contains("SUPABASE_SERVICE_KEY"));
    }

    #[test]
    fn page_and_rate_limits_must_be_coherent() {
        let mut config = base_config();
        config.default_page_size = 200;
        config.rate_limit_burst_limit = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("DEFAULT_PAGE_SIZE"));
        assert!(err.contains("Rate limits"));

        config.rate_limit_enabled = false;
        config.default_page_size = 20;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = base_config();
        config.supabase_service_key = "super-secret-service-key".into();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret-service-key"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
