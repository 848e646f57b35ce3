//! Admission middleware for the search routes.
//!
//! Wrap any router whose handlers reach the cache or the upstream API with
//! [`guard_routes`]; requests are admitted before the handler runs and
//! rejected with 429 otherwise. Admitted requests carry their
//! [`AdmissionDecision`] as a request extension.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{Extensions, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use geogate_rate_limit::{AdmissionDecision, AdmissionReason};
use serde_json::json;

use crate::state::{AppState, SharedState};

pub const REMAINING_CLIENT_HEADER: &str = "x-ratelimit-remaining-client";
pub const REMAINING_GLOBAL_HEADER: &str = "x-ratelimit-remaining-global";

/// Put every route of `routes` behind the rate limiter.
pub fn guard_routes(routes: Router, state: SharedState) -> Router {
    routes.layer(middleware::from_fn_with_state(state, enforce_admission))
}

/// Middleware: admit the request or answer 429.
pub async fn enforce_admission(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Response {
    let client_key = client_key(&state, request.headers(), request.extensions());
    let decision = state.limiter.admit(&client_key);

    if !decision.allowed {
        let scope = decision.reason.denied_scope().unwrap_or("unknown");
        state.metrics.requests_denied.with_label_values(&[scope]).inc();
        tracing::warn!(
            client_key = %client_key,
            reason = %decision.reason,
            "rate limit exceeded"
        );
        return rejection(&state, &decision);
    }

    state.metrics.requests_admitted.inc();

    // Handlers read the quota for their response body via `Extension<AdmissionDecision>`.
    request.extensions_mut().insert(decision);

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        REMAINING_CLIENT_HEADER,
        HeaderValue::from(decision.remaining_client_quota),
    );
    headers.insert(
        REMAINING_GLOBAL_HEADER,
        HeaderValue::from(decision.remaining_global_quota),
    );
    response
}

/// Normalized rate-limit key for a request.
///
/// The transport address comes from `ConnectInfo` when the server was started
/// with connection info; otherwise only the headers are consulted.
pub fn client_key(state: &AppState, headers: &HeaderMap, extensions: &Extensions) -> String {
    let remote = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    state.resolver.client_key(headers, remote.as_deref())
}

fn rejection(state: &AppState, decision: &AdmissionDecision) -> Response {
    let config = state.limiter.engine().config();
    let retry_after = match decision.reason {
        AdmissionReason::GlobalLimitExceeded => config.global_window,
        _ => config.client_window,
    };

    (
        StatusCode::TOO_MANY_REQUESTS,
        [("retry-after", retry_after.as_secs().to_string())],
        Json(json!({
            "error": "Rate limit exceeded",
            "message": decision.reason.message(),
            "remainingIpRequests": decision.remaining_client_quota,
            "remainingGlobalRequests": decision.remaining_global_quota,
        })),
    )
        .into_response()
}
