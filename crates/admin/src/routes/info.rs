use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/admin/info
///
/// Basic build and runtime information.
pub async fn get_info(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "application": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "timestamp": chrono::Utc::now().timestamp_millis()
    }))
}
