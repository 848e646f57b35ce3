//! Values handed back to callers of the admission engine.

use std::fmt;

/// Why a request was admitted or denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionReason {
    /// Rate limiting is switched off; nothing was counted.
    Disabled,
    /// Both scopes had room and the request was counted.
    Allowed,
    /// The process-wide ceiling is exhausted for this window.
    GlobalLimitExceeded,
    /// This client's ceiling is exhausted for this window.
    ClientLimitExceeded,
}

impl AdmissionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "rate limiting disabled",
            Self::Allowed => "request allowed",
            Self::GlobalLimitExceeded => "global limit exceeded",
            Self::ClientLimitExceeded => "client limit exceeded",
        }
    }

    /// Text suitable for showing to the throttled client.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Disabled => "Rate limiting disabled",
            Self::Allowed => "Request allowed",
            Self::GlobalLimitExceeded => "Global rate limit exceeded. Try again later.",
            Self::ClientLimitExceeded => {
                "Too many requests from your IP address. Please try again later."
            }
        }
    }

    /// The scope that caused a denial, if any.
    pub fn denied_scope(&self) -> Option<&'static str> {
        match self {
            Self::GlobalLimitExceeded => Some("global"),
            Self::ClientLimitExceeded => Some("client"),
            Self::Disabled | Self::Allowed => None,
        }
    }
}

impl fmt::Display for AdmissionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single [`admit`](crate::AdmissionEngine::admit) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub remaining_client_quota: u64,
    pub remaining_global_quota: u64,
    pub reason: AdmissionReason,
}

impl AdmissionDecision {
    pub(crate) fn bypass(client_limit: u64, global_limit: u64) -> Self {
        Self {
            allowed: true,
            remaining_client_quota: client_limit,
            remaining_global_quota: global_limit,
            reason: AdmissionReason::Disabled,
        }
    }

    pub(crate) fn admitted(remaining_client_quota: u64, remaining_global_quota: u64) -> Self {
        Self {
            allowed: true,
            remaining_client_quota,
            remaining_global_quota,
            reason: AdmissionReason::Allowed,
        }
    }

    pub(crate) fn denied(
        reason: AdmissionReason,
        remaining_client_quota: u64,
        remaining_global_quota: u64,
    ) -> Self {
        Self {
            allowed: false,
            remaining_client_quota,
            remaining_global_quota,
            reason,
        }
    }
}

/// Point-in-time snapshot of the limiter, for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateStatus {
    pub enabled: bool,
    pub current_global_count: u64,
    pub global_limit: u64,
    pub active_client_count: usize,
    pub per_client_limit: u64,
}

impl AggregateStatus {
    /// Global usage as a whole percentage of the nominal limit.
    ///
    /// Can exceed 100 while the burst allowance is being consumed.
    pub fn utilization_percentage(&self) -> u64 {
        if self.global_limit == 0 {
            return 0;
        }
        (self.current_global_count as f64 / self.global_limit as f64 * 100.0).round() as u64
    }

    /// `true` while global usage is below the nominal limit.
    pub fn is_healthy(&self) -> bool {
        self.current_global_count < self.global_limit
    }
}
