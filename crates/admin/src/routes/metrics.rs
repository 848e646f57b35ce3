use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use prometheus::{Encoder, TextEncoder, TEXT_FORMAT};

use crate::state::SharedState;

/// GET /api/admin/metrics
///
/// Admission counters in the Prometheus text exposition format.
pub async fn get_metrics(State(state): State<SharedState>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&state.metrics.registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "failed to encode prometheus metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("failed to encode metrics: {e}"),
        );
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, TEXT_FORMAT)],
        String::from_utf8_lossy(&buffer).into_owned(),
    )
}
