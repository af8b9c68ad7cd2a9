use std::sync::Arc;

use chrono::Duration;
use tracing_subscriber::EnvFilter;

use swift_deliver::api;
use swift_deliver::auth::TokenService;
use swift_deliver::config::{Config, LogFormat};
use swift_deliver::error::AppError;
use swift_deliver::seed;
use swift_deliver::state::AppState;
use swift_deliver::store::Store;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Json => subscriber.json().init(),
    }

    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET not set; tokens are signed with the development secret");
    }

    let store = match &config.data_file {
        Some(path) => Store::open(path.clone()).await?,
        None => Store::in_memory(),
    };

    if let Some(password) = &config.seed_driver_password {
        seed::seed_driver_accounts(&store, password).await?;
    }

    let tokens = TokenService::new(
        &config.jwt_secret,
        Duration::hours(config.token_ttl_hours),
    );
    let shared_state = Arc::new(AppState::new(store, tokens, config.event_buffer_size));

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    shared_state.store.close().await?;
    tracing::info!("store closed, shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
