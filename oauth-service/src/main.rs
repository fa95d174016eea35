use oauth_service::{
    build_router,
    config::OAuthServiceConfig,
    services::{InMemoryStore, ProfileFetcher, ProviderRegistry},
    AppState, Stores,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = OAuthServiceConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    oauth_service::services::metrics::init_metrics()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to initialize metrics: {}", e)))?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        login_host = %config.public.login_host,
        "Starting OAuth service"
    );

    // Unknown or incomplete providers stop the service here.
    let providers = Arc::new(
        ProviderRegistry::from_settings(&config.providers, config.public.login_base_url())
            .map_err(AppError::from)?,
    );
    let profiles: Arc<dyn ProfileFetcher> = providers.clone();

    let store = Arc::new(
        InMemoryStore::seeded(&config.tenants, &config.providers).map_err(AppError::from)?,
    );
    tracing::info!(
        tenants = config.tenants.hosts.len() + config.tenants.private_hosts.len(),
        "Tenant store initialized"
    );

    let stores = Stores {
        tenants: store.clone(),
        users: store.clone(),
        oauth_configs: store,
    };

    let addr = config.common.socket_addr();
    let state = AppState::new(config, stores, providers, profiles);
    let app = build_router(state).await?;

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
