//! Configuration module
//!
//! This module provides the configuration of the upload service: database, storage
//! backend, worker pool sizing and the batch orchestrator limits.

use std::env;

use crate::storage_types::StorageBackend;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_FILE_SIZE_MB: u64 = 100;
const MAX_FILES_PER_BATCH: usize = 100;
const UPLOAD_POOL_MAX_QUEUE_DEPTH: usize = 1000;
const UPLOAD_TASK_TIMEOUT_SECS: u64 = 120;
const UPLOAD_CHUNK_THRESHOLD: usize = 20;
const UPLOAD_PERSIST_RETRIES: u32 = 2;
const VIRUS_SCAN_TIMEOUT_SECS: u64 = 10;

/// Default number of upload workers: one less than the available cores, at least two.
pub fn default_pool_size() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cores.saturating_sub(1).max(2)
}

/// Base configuration shared by every binary
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    pub log_json: bool,
}

/// Upload service configuration
#[derive(Clone, Debug)]
pub struct UploadServiceConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Storage configuration
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    // Batch limits
    pub max_file_size_bytes: u64,
    pub max_files_per_batch: usize,
    // Worker pool
    pub upload_pool_size: usize,
    pub upload_pool_max_queue_depth: usize,
    pub upload_task_timeout_secs: u64,
    pub upload_chunk_threshold: usize,
    pub upload_persist_retries: u32,
    // Virus scan trigger
    pub virus_scan_enabled: bool,
    pub virus_scan_url: Option<String>,
    pub virus_scan_timeout_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<UploadServiceConfig>);

impl Config {
    fn as_upload(&self) -> &UploadServiceConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = UploadServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_upload().validate()
    }

    pub fn environment(&self) -> &str {
        &self.as_upload().base.environment
    }

    pub fn log_json(&self) -> bool {
        self.as_upload().base.log_json
    }

    pub fn database_url(&self) -> &str {
        &self.as_upload().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_upload().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_upload().base.db_timeout_seconds
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.as_upload().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.as_upload().s3_bucket.as_deref()
    }

    /// S3 region, preferring `S3_REGION` over `AWS_REGION`.
    pub fn s3_region(&self) -> Option<&str> {
        self.as_upload()
            .s3_region
            .as_deref()
            .or(self.as_upload().aws_region.as_deref())
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_upload().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_upload().local_storage_path.as_deref()
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.as_upload().max_file_size_bytes
    }

    pub fn max_files_per_batch(&self) -> usize {
        self.as_upload().max_files_per_batch
    }

    pub fn upload_pool_size(&self) -> usize {
        self.as_upload().upload_pool_size
    }

    pub fn upload_pool_max_queue_depth(&self) -> usize {
        self.as_upload().upload_pool_max_queue_depth
    }

    pub fn upload_task_timeout_secs(&self) -> u64 {
        self.as_upload().upload_task_timeout_secs
    }

    pub fn upload_chunk_threshold(&self) -> usize {
        self.as_upload().upload_chunk_threshold
    }

    pub fn upload_persist_retries(&self) -> u32 {
        self.as_upload().upload_persist_retries
    }

    pub fn virus_scan_enabled(&self) -> bool {
        self.as_upload().virus_scan_enabled
    }

    pub fn virus_scan_url(&self) -> Option<&str> {
        self.as_upload().virus_scan_url.as_deref()
    }

    pub fn virus_scan_timeout_secs(&self) -> u64 {
        self.as_upload().virus_scan_timeout_secs
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .to_lowercase()
        .parse()
        .unwrap_or(default)
}

impl BaseConfig {
    pub fn from_env() -> Self {
        Self {
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_json: env_bool("LOG_JSON", false),
        }
    }
}

/// `STORAGE_BACKEND` when set. An unknown value is an error, not a silent default.
fn parse_storage_backend(raw: Option<String>) -> Result<Option<StorageBackend>, anyhow::Error> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<StorageBackend>())
        .transpose()
}

fn megabytes_to_bytes(mb: u64) -> u64 {
    mb.saturating_mul(1024 * 1024)
}

impl UploadServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let base = BaseConfig::from_env();

        let storage_backend = parse_storage_backend(env::var("STORAGE_BACKEND").ok())?;

        let max_file_size_mb: u64 = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let pool_size = default_pool_size();

        let config = UploadServiceConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            aws_region: env::var("AWS_REGION").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            max_file_size_bytes: megabytes_to_bytes(max_file_size_mb),
            max_files_per_batch: env::var("MAX_FILES_PER_BATCH")
                .unwrap_or_else(|_| MAX_FILES_PER_BATCH.to_string())
                .parse()
                .unwrap_or(MAX_FILES_PER_BATCH),
            upload_pool_size: env::var("UPLOAD_POOL_SIZE")
                .unwrap_or_else(|_| pool_size.to_string())
                .parse()
                .unwrap_or(pool_size),
            upload_pool_max_queue_depth: env::var("UPLOAD_POOL_MAX_QUEUE_DEPTH")
                .unwrap_or_else(|_| UPLOAD_POOL_MAX_QUEUE_DEPTH.to_string())
                .parse()
                .unwrap_or(UPLOAD_POOL_MAX_QUEUE_DEPTH),
            upload_task_timeout_secs: env::var("UPLOAD_TASK_TIMEOUT_SECS")
                .unwrap_or_else(|_| UPLOAD_TASK_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(UPLOAD_TASK_TIMEOUT_SECS),
            upload_chunk_threshold: env::var("UPLOAD_CHUNK_THRESHOLD")
                .unwrap_or_else(|_| UPLOAD_CHUNK_THRESHOLD.to_string())
                .parse()
                .unwrap_or(UPLOAD_CHUNK_THRESHOLD),
            upload_persist_retries: env::var("UPLOAD_PERSIST_RETRIES")
                .unwrap_or_else(|_| UPLOAD_PERSIST_RETRIES.to_string())
                .parse()
                .unwrap_or(UPLOAD_PERSIST_RETRIES),
            virus_scan_enabled: env_bool("VIRUS_SCAN_ENABLED", false),
            virus_scan_url: env::var("VIRUS_SCAN_URL").ok().filter(|s| !s.is_empty()),
            virus_scan_timeout_secs: env::var("VIRUS_SCAN_TIMEOUT_SECS")
                .unwrap_or_else(|_| VIRUS_SCAN_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(VIRUS_SCAN_TIMEOUT_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.upload_pool_size == 0 {
            return Err(anyhow::anyhow!("UPLOAD_POOL_SIZE must be at least 1"));
        }

        if self.upload_pool_max_queue_depth == 0 {
            return Err(anyhow::anyhow!(
                "UPLOAD_POOL_MAX_QUEUE_DEPTH must be at least 1"
            ));
        }

        if self.upload_task_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "UPLOAD_TASK_TIMEOUT_SECS must be at least 1"
            ));
        }

        if self.max_files_per_batch == 0 {
            return Err(anyhow::anyhow!("MAX_FILES_PER_BATCH must be at least 1"));
        }

        if self.virus_scan_enabled && self.virus_scan_url.is_none() {
            return Err(anyhow::anyhow!(
                "VIRUS_SCAN_ENABLED=true requires VIRUS_SCAN_URL to be set"
            ));
        }

        // Validate storage backend configuration
        let backend = self.storage_backend.unwrap_or(StorageBackend::S3);
        match backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> UploadServiceConfig {
        UploadServiceConfig {
            base: BaseConfig {
                db_max_connections: MAX_CONNECTIONS,
                db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
                environment: "test".to_string(),
                log_json: false,
            },
            database_url: "postgresql://localhost/stratus".to_string(),
            storage_backend: Some(StorageBackend::Local),
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            local_storage_path: Some("/tmp/stratus".to_string()),
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            max_files_per_batch: MAX_FILES_PER_BATCH,
            upload_pool_size: 4,
            upload_pool_max_queue_depth: UPLOAD_POOL_MAX_QUEUE_DEPTH,
            upload_task_timeout_secs: UPLOAD_TASK_TIMEOUT_SECS,
            upload_chunk_threshold: UPLOAD_CHUNK_THRESHOLD,
            upload_persist_retries: UPLOAD_PERSIST_RETRIES,
            virus_scan_enabled: false,
            virus_scan_url: None,
            virus_scan_timeout_secs: VIRUS_SCAN_TIMEOUT_SECS,
        }
    }

    #[test]
    fn test_default_pool_size_is_at_least_two() {
        assert!(default_pool_size() >= 2);
    }

    #[test]
    fn test_local_config_is_valid() {
        assert!(local_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_postgres_url() {
        let mut config = local_config();
        config.database_url = "mysql://localhost/stratus".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_s3_requires_bucket_and_region() {
        let mut config = local_config();
        config.storage_backend = Some(StorageBackend::S3);
        assert!(config.validate().is_err());

        config.s3_bucket = Some("uploads".to_string());
        assert!(config.validate().is_err());

        config.aws_region = Some("eu-west-1".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_limits_must_be_positive() {
        let mut config = local_config();
        config.upload_pool_size = 0;
        assert!(config.validate().is_err());

        let mut config = local_config();
        config.upload_pool_max_queue_depth = 0;
        assert!(config.validate().is_err());

        let mut config = local_config();
        config.upload_task_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_virus_scan_requires_url() {
        let mut config = local_config();
        config.virus_scan_enabled = true;
        assert!(config.validate().is_err());
        config.virus_scan_url = Some("http://scanner:8080/scan".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_storage_backend_is_an_error() {
        assert!(parse_storage_backend(Some("s4".to_string())).is_err());
        assert_eq!(
            parse_storage_backend(Some("Local".to_string())).unwrap(),
            Some(StorageBackend::Local)
        );
        assert_eq!(parse_storage_backend(None).unwrap(), None);
        assert_eq!(parse_storage_backend(Some(" ".to_string())).unwrap(), None);
    }

    #[test]
    fn test_huge_file_size_saturates() {
        assert_eq!(megabytes_to_bytes(100), 100 * 1024 * 1024);
        assert_eq!(megabytes_to_bytes(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_s3_region_prefers_s3_region() {
        let mut inner = local_config();
        inner.s3_region = Some("us-east-2".to_string());
        inner.aws_region = Some("eu-west-1".to_string());
        let config = Config(Box::new(inner));
        assert_eq!(config.s3_region(), Some("us-east-2"));
    }
}
