use genetics_service::config::{GeneticsConfig, SERVICE_NAME};
use genetics_service::services::metrics::init_metrics;
use genetics_service::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GeneticsConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_tracing(SERVICE_NAME, &config.log_level, config.otlp_endpoint.as_deref());
    init_metrics();

    tracing::info!(
        database = %config.database.path.display(),
        model = %config.chat.model,
        "Starting {}",
        SERVICE_NAME
    );

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        anyhow::anyhow!("Startup error: {}", e)
    })?;

    app.run_until_stopped().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
