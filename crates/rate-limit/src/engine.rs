use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use geogate_common::RateLimitConfig;

use crate::clock::{Clock, SystemClock};
use crate::counter::WindowCounter;
use crate::decision::{AdmissionDecision, AdmissionReason, AggregateStatus};

/// Limits for both admission scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionConfig {
    pub enabled: bool,
    pub client_limit: u64,
    pub client_window: Duration,
    pub global_limit: u64,
    pub global_window: Duration,
    /// Added to each limit to get the denial threshold.
    pub burst_allowance: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            client_limit: 10,
            client_window: Duration::from_secs(60),
            global_limit: 100,
            global_window: Duration::from_secs(60),
            burst_allowance: 5,
        }
    }
}

impl From<&RateLimitConfig> for AdmissionConfig {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            client_limit: config.client.requests,
            client_window: Duration::from_secs(config.client.window_secs),
            global_limit: config.global.requests,
            global_window: Duration::from_secs(config.global.window_secs),
            burst_allowance: config.burst_allowance,
        }
    }
}

/// Two-scope fixed-window admission control.
///
/// A request must fit under the global ceiling and then under its client's
/// ceiling. Windows are rolled lazily: every [`admit`](Self::admit) and
/// [`status`](Self::status) sweeps stale counters before looking at them.
///
/// The check and the increment are not one transaction. Under contention the
/// global count can overshoot its threshold by the number of requests in
/// flight; the burst allowance absorbs that.
pub struct AdmissionEngine {
    config: AdmissionConfig,
    clock: Arc<dyn Clock>,
    global: WindowCounter,
    clients: DashMap<String, WindowCounter>,
}

impl AdmissionEngine {
    pub fn new(config: AdmissionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: AdmissionConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            config,
            clock,
            global: WindowCounter::new(now),
            clients: DashMap::new(),
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Decide whether a request from `client_key` may proceed, counting it
    /// against both scopes if so.
    pub fn admit(&self, client_key: &str) -> AdmissionDecision {
        let cfg = &self.config;
        if !cfg.enabled {
            return AdmissionDecision::bypass(cfg.client_limit, cfg.global_limit);
        }

        let now = self.clock.now();
        self.sweep_at(now);

        let global_count = self.global.get();
        if global_count >= cfg.global_limit.saturating_add(cfg.burst_allowance) {
            tracing::warn!(
                client_key,
                global_count,
                window_secs = cfg.global_window.as_secs(),
                "global rate limit exceeded"
            );
            return AdmissionDecision::denied(AdmissionReason::GlobalLimitExceeded, 0, 0);
        }

        // The entry guard locks this key's shard, so creation is race-free and
        // the client check and increment below see a consistent count.
        let entry = self
            .clients
            .entry(client_key.to_string())
            .or_insert_with(|| WindowCounter::new(now));

        let client_count = entry.value().get();
        if client_count >= cfg.client_limit.saturating_add(cfg.burst_allowance) {
            drop(entry);
            tracing::warn!(
                client_key,
                client_count,
                window_secs = cfg.client_window.as_secs(),
                "client rate limit exceeded"
            );
            return AdmissionDecision::denied(
                AdmissionReason::ClientLimitExceeded,
                0,
                cfg.global_limit.saturating_sub(self.global.get()),
            );
        }

        let client_count = entry.value().increment();
        drop(entry);
        let global_count = self.global.increment();

        tracing::debug!(client_key, client_count, global_count, "request admitted");

        AdmissionDecision::admitted(
            cfg.client_limit.saturating_sub(client_count),
            cfg.global_limit.saturating_sub(global_count),
        )
    }

    /// Sweep, then report a snapshot of the current windows.
    pub fn status(&self) -> AggregateStatus {
        self.sweep();
        AggregateStatus {
            enabled: self.config.enabled,
            current_global_count: self.global.get(),
            global_limit: self.config.global_limit,
            active_client_count: self.clients.len(),
            per_client_limit: self.config.client_limit,
        }
    }

    /// Roll expired windows and drop clients that have gone quiet.
    pub fn sweep(&self) {
        self.sweep_at(self.clock.now());
    }

    fn sweep_at(&self, now: Instant) {
        if self.global.reset_if_expired(now, self.config.global_window) {
            tracing::debug!("global window reset");
        }

        let window = self.config.client_window;
        let before = self.clients.len();

        // An expired counter that saw traffic is rolled in place. One that
        // stayed at zero for a whole window, or was never swept for two
        // windows, belongs to a client that left and is removed.
        self.clients.retain(|_, counter| {
            let elapsed = counter.elapsed(now);
            if elapsed < window {
                return true;
            }
            if counter.get() == 0 || elapsed >= window.saturating_mul(2) {
                return false;
            }
            counter.reset(now);
            true
        });

        let removed = before.saturating_sub(self.clients.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.clients.len(), "evicted idle clients");
        }
    }

    /// Current count for `client_key`, without sweeping.
    pub fn client_count(&self, client_key: &str) -> Option<u64> {
        self.clients.get(client_key).map(|counter| counter.get())
    }

    /// Current global count, without sweeping.
    pub fn global_count(&self) -> u64 {
        self.global.get()
    }

    /// Number of client entries held, without sweeping.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}
