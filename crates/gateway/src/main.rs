use common::TelemetryGuard;
use gateway::{config::get_configuration, logging::setup_logging, router, state::AppState};
use inference::{
    HubWeightStore, InferenceConfig, InferenceService, ModelResolver, backend::ort::OrtLoader,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration()?;

    let _telemetry = config
        .otel_endpoint
        .as_ref()
        .map(|endpoint| TelemetryGuard::init("gateway", endpoint))
        .transpose()?;

    setup_logging(&config);

    let inference_config = InferenceConfig::from_env()?;
    tracing::info!(
        config = ?config,
        inference = ?inference_config,
        "Loaded configuration"
    );

    let store = Arc::new(HubWeightStore::from_config(&inference_config)?);
    let loader = Arc::new(OrtLoader::from_config(&inference_config));
    let resolver = Arc::new(ModelResolver::new(&inference_config, store, loader));
    let service = InferenceService::new(resolver, &inference_config);

    // No usable weights at all is fatal
    service.warmup().await?;

    let app = router(AppState::new(service), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.address()).await?;
    tracing::info!(address = %config.address(), "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
