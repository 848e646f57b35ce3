//! Request admission for the geogate search API.
//!
//! Every inbound search request passes through [`RateLimiter::admit`] before
//! any cache lookup or upstream call. Admission is decided under two nested
//! fixed-window scopes:
//!
//! - **Global** -- one counter shared by all callers, protecting the upstream
//!   quota.
//! - **Per client** -- one counter per normalized client key, so a single
//!   caller cannot drain the global budget.
//!
//! Both limits are raised by the same burst allowance before denial kicks in.
//! State lives in memory only. Per-client counters are kept in a
//! [`DashMap`](dashmap::DashMap) and idle clients are evicted by the sweep
//! that runs at the start of every admission and status call.

pub mod clock;
pub mod counter;
pub mod decision;
pub mod engine;

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::WindowCounter;
pub use decision::{AdmissionDecision, AdmissionReason, AggregateStatus};
pub use engine::{AdmissionConfig, AdmissionEngine};

/// Shared handle to an [`AdmissionEngine`].
///
/// Construct one at process start and hand clones to every request handler.
/// Clones are cheap (backed by `Arc`) and all see the same counters.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<AdmissionEngine>,
}

impl RateLimiter {
    /// Create a limiter that reads the system clock.
    pub fn new(config: AdmissionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a limiter driven by the given clock.
    pub fn with_clock(config: AdmissionConfig, clock: Arc<dyn Clock>) -> Self {
        tracing::info!(
            enabled = config.enabled,
            client_limit = config.client_limit,
            client_window_secs = config.client_window.as_secs(),
            global_limit = config.global_limit,
            global_window_secs = config.global_window.as_secs(),
            burst_allowance = config.burst_allowance,
            "creating admission rate limiter"
        );
        Self {
            inner: Arc::new(AdmissionEngine::with_clock(config, clock)),
        }
    }

    /// Decide whether a request from `client_key` may proceed.
    ///
    /// A denial is a normal outcome, reported through
    /// [`AdmissionDecision::allowed`]; callers should answer with 429.
    pub fn admit(&self, client_key: &str) -> AdmissionDecision {
        self.inner.admit(client_key)
    }

    /// Snapshot for monitoring endpoints. Not itself rate limited.
    pub fn status(&self) -> AggregateStatus {
        self.inner.status()
    }

    pub fn sweep(&self) {
        self.inner.sweep();
    }

    /// The engine behind this handle, for read-only inspection.
    pub fn engine(&self) -> &AdmissionEngine {
        &self.inner
    }

    /// Spawn a thread that sweeps stale windows every `interval`.
    ///
    /// The thread holds only a weak reference and exits on the first tick
    /// after the last `RateLimiter` clone is dropped. Inline sweeping on
    /// every call continues regardless.
    pub fn start_sweep_task(&self, interval: Duration) -> std::io::Result<JoinHandle<()>> {
        let weak = Arc::downgrade(&self.inner);

        std::thread::Builder::new()
            .name("rate-limit-sweep".into())
            .spawn(move || loop {
                std::thread::sleep(interval);

                let Some(engine) = weak.upgrade() else {
                    tracing::debug!("rate limiter dropped, stopping sweep thread");
                    break;
                };
                engine.sweep();

                tracing::trace!("rate limiter sweep tick completed");
            })
    }
}
