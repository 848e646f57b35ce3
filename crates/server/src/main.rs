use std::time::Duration;

use anyhow::Result;
use geogate_common::AppConfig;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    // Parse command-line args for config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/geogate.yaml".to_string());

    info!(config_path = %config_path, "starting geogate");

    let config = AppConfig::load(&config_path)?;
    let state = geogate_admin::new_shared_state(&config)?;

    // The handle is not joined; the thread stops once the limiter is dropped.
    if let Some(secs) = config.rate_limit.sweep_interval_secs {
        state.limiter.start_sweep_task(Duration::from_secs(secs))?;
        info!(interval_secs = secs, "background rate limit sweep started");
    }

    // Search routes belong to the HTTP layer and are wrapped with
    // `geogate_admin::guard_routes` where they are mounted.
    let app = geogate_admin::build_router(state);

    if let Err(e) = geogate_admin::run_server(app, &config.server.listen, shutdown_signal()).await {
        error!(error = %e, "server error");
        return Err(e);
    }

    info!("geogate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
