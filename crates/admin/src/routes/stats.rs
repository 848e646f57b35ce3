use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/admin/rate-limit-stats
///
/// Aggregate limiter state for dashboards.
pub async fn get_rate_limit_stats(State(state): State<SharedState>) -> Json<Value> {
    tracing::info!("rate limit statistics requested");

    let status = state.limiter.status();

    Json(json!({
        "rateLimitEnabled": status.enabled,
        "global": {
            "currentRequests": status.current_global_count,
            "limit": status.global_limit,
            "utilizationPercentage": status.utilization_percentage()
        },
        "perIp": {
            "activeIpAddresses": status.active_client_count,
            "ipLimit": status.per_client_limit
        },
        "timestamp": chrono::Utc::now().timestamp_millis()
    }))
}
