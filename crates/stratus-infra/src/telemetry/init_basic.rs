use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "stratus=debug,stratus_worker=debug,stratus_upload=debug";

/// Initialize tracing with an `EnvFilter` (`RUST_LOG`, default `stratus=debug`) and a fmt
/// layer, JSON when `json` is set.
///
/// Returns an error instead of panicking when a global subscriber is already installed.
pub fn init_telemetry(
    service_name: &str,
    environment: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    tracing::info!(
        service = %service_name,
        environment = %environment,
        json = json,
        "Tracing initialized"
    );
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::debug!("Telemetry shutdown");
}
