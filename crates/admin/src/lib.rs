pub mod admission;
pub mod routes;
pub mod state;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use admission::{enforce_admission, guard_routes};
pub use state::{AdmissionMetrics, AppState, SharedState};

/// Build the monitoring router. None of these routes are rate limited.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/admin/health", get(routes::health::health_check))
        .route(
            "/api/admin/rate-limit-stats",
            get(routes::stats::get_rate_limit_stats),
        )
        .route("/api/admin/info", get(routes::info::get_info))
        .route("/api/admin/metrics", get(routes::metrics::get_metrics))
        .route(
            "/api/places/rate-limit-status",
            get(routes::status::get_client_status),
        )
        .with_state(state)
        .layer(cors)
}

/// Serve `app` on `listen_addr` until `shutdown` resolves.
///
/// Connection info is attached to every request so the admission middleware
/// can fall back to the peer address.
pub async fn run_server<F>(app: Router, listen_addr: &str, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listen_addr, "API server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    Ok(())
}

/// Convenience function to create a SharedState from an AppConfig.
pub fn new_shared_state(config: &geogate_common::AppConfig) -> anyhow::Result<SharedState> {
    Ok(Arc::new(AppState::from_config(config)?))
}
