use std::sync::Arc;

use geogate_client_ip::ClientKeyResolver;
use geogate_common::AppConfig;
use geogate_rate_limit::{AdmissionConfig, RateLimiter};
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Shared state type alias used across all route handlers.
pub type SharedState = Arc<AppState>;

/// Everything a request handler needs to admit and report.
pub struct AppState {
    pub limiter: RateLimiter,
    pub resolver: ClientKeyResolver,
    pub metrics: AdmissionMetrics,
    pub service_name: String,
    pub start_time: std::time::Instant,
}

/// Prometheus counters for admission outcomes.
pub struct AdmissionMetrics {
    pub registry: Registry,
    pub requests_admitted: IntCounter,
    pub requests_denied: IntCounterVec,
}

impl AdmissionMetrics {
    /// Create the counters and register them against a fresh registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_admitted = IntCounter::with_opts(Opts::new(
            "geogate_requests_admitted_total",
            "Total number of search requests admitted by the rate limiter",
        ))?;

        let requests_denied = IntCounterVec::new(
            Opts::new(
                "geogate_requests_denied_total",
                "Total number of search requests denied by the rate limiter",
            ),
            &["scope"],
        )?;

        registry.register(Box::new(requests_admitted.clone()))?;
        registry.register(Box::new(requests_denied.clone()))?;

        Ok(Self {
            registry,
            requests_admitted,
            requests_denied,
        })
    }
}

impl AppState {
    /// Build state around an existing limiter.
    pub fn new(
        limiter: RateLimiter,
        resolver: ClientKeyResolver,
        service_name: impl Into<String>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            limiter,
            resolver,
            metrics: AdmissionMetrics::new()?,
            service_name: service_name.into(),
            start_time: std::time::Instant::now(),
        })
    }

    /// Build state, limiter included, from the application config.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let limiter = RateLimiter::new(AdmissionConfig::from(&config.rate_limit));
        let resolver = ClientKeyResolver::from_config(&config.rate_limit);
        Self::new(limiter, resolver, config.server.service_name.clone())
    }
}
