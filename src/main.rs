mod config;

use clap::Parser as _;
use config::Config;
use paper_relay::{
    AppState, build_metrics_layer_and_handle, build_metrics_router, build_router,
    client::PoolConfig,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, instrument};

#[tokio::main]
#[instrument]
pub async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment and flags still apply
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse().validate()?;
    info!("Starting paper relay with config: {:?}", config);
    info!("Backend base URL configured as: {}", config.backend_url);

    let pool = PoolConfig {
        max_idle_per_host: config.pool_max_idle_per_host,
        idle_timeout: Duration::from_secs(config.pool_idle_timeout_secs),
    };
    let app_state = AppState::new(config.settings(), pool)?;
    let mut router = build_router(app_state);

    if config.metrics {
        let (prometheus_layer, handle) =
            build_metrics_layer_and_handle(config.metrics_prefix.clone());
        router = router.layer(prometheus_layer);

        let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
        let metrics_listener = TcpListener::bind(&metrics_addr).await?;
        info!("Metrics endpoint listening on {}", metrics_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(metrics_listener, build_metrics_router(handle)).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    }

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Paper relay listening on {}", bind_addr);

    axum::serve(listener, router).await?;

    Ok(())
}
