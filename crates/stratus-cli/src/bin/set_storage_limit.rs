use anyhow::{Context, Result};
use clap::Parser;
use uuid::Uuid;

use stratus_cli::print_json;
use stratus_core::{Config, QuotaService};
use stratus_db::{setup_database, UsageRepository};
use stratus_infra::{init_telemetry, shutdown_telemetry};

#[derive(Parser, Debug)]
#[command(name = "set_storage_limit")]
#[command(about = "Set or clear the storage ceiling of an organization")]
struct Args {
    #[arg(long, value_name = "UUID")]
    org: Uuid,

    /// Ceiling in bytes
    #[arg(
        long,
        value_name = "BYTES",
        conflicts_with = "unlimited",
        required_unless_present = "unlimited"
    )]
    limit_bytes: Option<u64>,

    /// Remove the ceiling
    #[arg(long)]
    unlimited: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_telemetry("stratus-set-storage-limit", config.environment(), config.log_json())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    let limit = args
        .limit_bytes
        .map(i64::try_from)
        .transpose()
        .context("Storage limit does not fit a signed 64-bit integer")?;

    let usage = UsageRepository::new(setup_database(&config).await?);
    usage
        .set_limit(args.org, limit)
        .await
        .with_context(|| format!("Failed to set storage limit of {}", args.org))?;
    tracing::info!(org_id = %args.org, limit_bytes = ?limit, "Storage limit updated");

    let decision = usage.check(args.org, 0).await?;
    print_json(&decision)?;
    shutdown_telemetry().await;
    Ok(())
}
