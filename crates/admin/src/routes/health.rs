use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/admin/health
///
/// Liveness plus a rate-limiting summary. The limiter counts as healthy while
/// global usage is below the nominal limit.
pub async fn health_check(State(state): State<SharedState>) -> Json<Value> {
    let status = state.limiter.status();

    Json(json!({
        "status": "UP",
        "service": state.service_name,
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "timestamp": chrono::Utc::now().timestamp_millis(),
        "rateLimiting": {
            "enabled": status.enabled,
            "healthy": status.is_healthy()
        }
    }))
}
