use anyhow::{Context, Result};
use clap::Parser;
use uuid::Uuid;

use stratus_cli::print_json;
use stratus_core::Config;
use stratus_db::{setup_database, UsageRepository};
use stratus_infra::{init_telemetry, shutdown_telemetry};

#[derive(Parser, Debug)]
#[command(name = "reconcile_usage")]
#[command(about = "Recompute storage usage counters from the files table")]
struct Args {
    /// Organizations to reconcile
    #[arg(long = "org", value_name = "UUID", required = true)]
    orgs: Vec<Uuid>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_telemetry("stratus-reconcile-usage", config.environment(), config.log_json())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    let usage = UsageRepository::new(setup_database(&config).await?);

    let mut totals = Vec::with_capacity(args.orgs.len());
    for org_id in args.orgs {
        let before = usage.get(org_id).await?;
        let after = usage
            .reconcile(org_id)
            .await
            .with_context(|| format!("Failed to reconcile usage of {}", org_id))?;
        if before != after {
            tracing::warn!(
                org_id = %org_id,
                counted_bytes = before.used_storage_bytes,
                actual_bytes = after.used_storage_bytes,
                counted_files = before.file_count,
                actual_files = after.file_count,
                "Storage usage drift repaired"
            );
        }
        totals.push(after);
    }

    print_json(&totals)?;
    shutdown_telemetry().await;
    Ok(())
}
