use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use stratus_cli::{print_json, read_upload_directory};
use stratus_core::models::UploadContext;
use stratus_core::{Config, ErrorMetadata};
use stratus_db::{setup_database, PgFileMetadataStore};
use stratus_infra::{init_telemetry, shutdown_telemetry, MemoryProbe};
use stratus_services::create_scan_trigger;
use stratus_storage::create_storage;
use stratus_upload::{create_upload_pool, BatchUploadService, UploadSettings};
use stratus_worker::WorkerPoolConfig;

#[derive(Parser, Debug)]
#[command(name = "batch_upload")]
#[command(about = "Upload every file of a directory as one batch")]
struct Args {
    /// Organization the files belong to
    #[arg(long, value_name = "UUID")]
    org: Uuid,

    /// Uploading user
    #[arg(long, value_name = "UUID")]
    user: Uuid,

    /// Display name of the uploading user
    #[arg(long)]
    name: String,

    #[arg(long)]
    email: String,

    /// Destination folder inside the organization, e.g. "reports/2024"
    #[arg(long)]
    folder: Option<String>,

    /// Directory whose files are uploaded
    dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_telemetry("stratus-batch-upload", config.environment(), config.log_json())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    let files = read_upload_directory(&args.dir).await?;
    tracing::info!(dir = %args.dir.display(), files = files.len(), "Loaded upload directory");

    let db = setup_database(&config).await?;
    let storage = create_storage(&config)
        .await
        .context("Failed to initialize storage")?;
    let scanner = create_scan_trigger(&config).context("Failed to initialize virus scanner")?;
    let metadata = Arc::new(PgFileMetadataStore::new(db));
    let quota = Arc::new(metadata.usage().clone());

    let pool = create_upload_pool(storage.clone(), WorkerPoolConfig::from(&config));
    pool.init().context("Failed to start upload worker pool")?;

    let service = BatchUploadService::new(
        pool,
        storage,
        metadata,
        quota,
        scanner,
        Arc::new(MemoryProbe::new()),
        UploadSettings::from(&config),
    );

    let context = UploadContext {
        org_id: args.org,
        user_id: args.user,
        user_name: args.name,
        user_email: args.email,
        folder: args.folder,
    };

    let outcome = service.upload_batch(context, files).await;

    service.shutdown().await;

    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(
                error = %err,
                code = err.error_code(),
                status = err.http_status_code(),
                "Batch upload failed"
            );
            shutdown_telemetry().await;
            return Err(err.into());
        }
    };

    if result.has_failures() {
        tracing::warn!(
            failed = result.statistics.failed,
            successful = result.statistics.successful,
            "Some files were not uploaded"
        );
    }

    print_json(&result)?;
    shutdown_telemetry().await;
    Ok(())
}
