use axum::extract::{Request, State};
use axum::Json;
use serde_json::{json, Value};

use crate::admission::client_key;
use crate::state::SharedState;

/// GET /api/places/rate-limit-status
///
/// Limiter status as seen by the calling client. Not itself rate limited.
pub async fn get_client_status(State(state): State<SharedState>, request: Request) -> Json<Value> {
    let client_ip = client_key(&state, request.headers(), request.extensions());
    let status = state.limiter.status();

    Json(json!({
        "clientIp": client_ip,
        "rateLimitEnabled": status.enabled,
        "globalRequests": status.current_global_count,
        "globalLimit": status.global_limit,
        "activeIpAddresses": status.active_client_count,
        "ipLimit": status.per_client_limit
    }))
}
