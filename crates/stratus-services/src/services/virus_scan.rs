use async_trait::async_trait;
use std::sync::Arc;
use stratus_core::{AppError, Config, VirusScanTrigger};
use uuid::Uuid;

#[cfg(feature = "virus-scan-http")]
use std::time::{Duration, Instant};

/// Scan request body posted to the scanner.
#[derive(Debug, serde::Serialize)]
struct ScanRequest<'a> {
    file_id: Uuid,
    storage_key: &'a str,
}

/// Posts `{file_id, storage_key}` to the external scanner, which reports back on its own
/// callback.
#[cfg(feature = "virus-scan-http")]
#[derive(Clone)]
pub struct HttpScanTrigger {
    client: reqwest::Client,
    url: String,
}

#[cfg(feature = "virus-scan-http")]
impl HttpScanTrigger {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[cfg(feature = "virus-scan-http")]
#[async_trait]
impl VirusScanTrigger for HttpScanTrigger {
    async fn submit(&self, file_id: Uuid, storage_key: &str) -> Result<(), AppError> {
        let start = Instant::now();

        let response = self
            .client
            .post(&self.url)
            .json(&ScanRequest {
                file_id,
                storage_key,
            })
            .send()
            .await
            .map_err(|e| AppError::VirusScan(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::VirusScan(format!(
                "scanner returned HTTP {}",
                status.as_u16()
            )));
        }

        tracing::debug!(
            file_id = %file_id,
            storage_key = %storage_key,
            duration_ms = start.elapsed().as_millis() as u64,
            "Virus scan submitted"
        );
        Ok(())
    }
}

/// Trigger used when scanning is disabled. Always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScanTrigger;

#[async_trait]
impl VirusScanTrigger for NoopScanTrigger {
    async fn submit(&self, file_id: Uuid, _storage_key: &str) -> Result<(), AppError> {
        tracing::trace!(file_id = %file_id, "Virus scanning disabled, skipping");
        Ok(())
    }
}

/// Build the scan trigger from configuration.
pub fn create_scan_trigger(config: &Config) -> Result<Arc<dyn VirusScanTrigger>, AppError> {
    if !config.virus_scan_enabled() {
        return Ok(Arc::new(NoopScanTrigger));
    }

    #[cfg(feature = "virus-scan-http")]
    {
        let url = config.virus_scan_url().ok_or_else(|| {
            AppError::InvalidInput("VIRUS_SCAN_URL must be set when scanning is enabled".into())
        })?;
        let timeout = Duration::from_secs(config.virus_scan_timeout_secs());
        Ok(Arc::new(HttpScanTrigger::new(url, timeout)?))
    }

    #[cfg(not(feature = "virus-scan-http"))]
    {
        Err(AppError::InvalidInput(
            "Virus scanning enabled but the virus-scan-http feature is not compiled in".into(),
        ))
    }
}
