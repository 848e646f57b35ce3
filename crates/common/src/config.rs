use serde::{Deserialize, Serialize};

use crate::error::{GeogateError, GeogateResult};

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            service_name: default_service_name(),
        }
    }
}

/// Admission settings, fixed at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_client_scope")]
    pub client: ScopeLimitConfig,
    #[serde(default = "default_global_scope")]
    pub global: ScopeLimitConfig,
    /// Added to both scope limits before a request is denied.
    #[serde(default = "default_burst_allowance")]
    pub burst_allowance: u64,
    /// When set, a background thread also sweeps stale windows.
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
    /// Proxy headers consulted for the client address, highest priority first.
    #[serde(default = "default_trusted_headers")]
    pub trusted_headers: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            client: default_client_scope(),
            global: default_global_scope(),
            burst_allowance: default_burst_allowance(),
            sweep_interval_secs: None,
            trusted_headers: default_trusted_headers(),
        }
    }
}

/// Request ceiling for one scope and the length of its fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeLimitConfig {
    pub requests: u64,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

// Default value helpers
fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_service_name() -> String {
    "geogate".to_string()
}
fn default_true() -> bool {
    true
}
fn default_window_secs() -> u64 {
    60
}
fn default_client_scope() -> ScopeLimitConfig {
    ScopeLimitConfig {
        requests: 10,
        window_secs: default_window_secs(),
    }
}
fn default_global_scope() -> ScopeLimitConfig {
    ScopeLimitConfig {
        requests: 100,
        window_secs: default_window_secs(),
    }
}
fn default_burst_allowance() -> u64 {
    5
}
fn default_trusted_headers() -> Vec<String> {
    [
        "X-Forwarded-For",
        "X-Real-IP",
        "Proxy-Client-IP",
        "WL-Proxy-Client-IP",
        "HTTP_X_FORWARDED_FOR",
        "HTTP_X_FORWARDED",
        "HTTP_X_CLUSTER_CLIENT_IP",
        "HTTP_CLIENT_IP",
        "HTTP_FORWARDED_FOR",
        "HTTP_FORWARDED",
        "HTTP_VIA",
        "REMOTE_ADDR",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &str) -> GeogateResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        tracing::info!(path, "configuration loaded");
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(content: &str) -> GeogateResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> GeogateResult<()> {
        if self.server.listen.trim().is_empty() {
            return Err(GeogateError::Config(
                "server.listen must not be empty".to_string(),
            ));
        }

        let rl = &self.rate_limit;
        for (name, scope) in [("client", &rl.client), ("global", &rl.global)] {
            if scope.requests == 0 {
                return Err(GeogateError::Config(format!(
                    "rate_limit.{name}.requests must be positive"
                )));
            }
            if scope.window_secs == 0 {
                return Err(GeogateError::Config(format!(
                    "rate_limit.{name}.window_secs must be positive"
                )));
            }
        }

        if rl.sweep_interval_secs == Some(0) {
            return Err(GeogateError::Config(
                "rate_limit.sweep_interval_secs must be positive when set".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_yaml("{}").unwrap();
        let rl = &config.rate_limit;

        assert!(rl.enabled);
        assert_eq!(rl.client, ScopeLimitConfig { requests: 10, window_secs: 60 });
        assert_eq!(rl.global, ScopeLimitConfig { requests: 100, window_secs: 60 });
        assert_eq!(rl.burst_allowance, 5);
        assert_eq!(rl.sweep_interval_secs, None);
        assert_eq!(rl.trusted_headers.first().map(String::as_str), Some("X-Forwarded-For"));
        assert_eq!(rl.trusted_headers.last().map(String::as_str), Some("REMOTE_ADDR"));
        assert_eq!(config.server.listen, "0.0.0.0:8080");
    }

    #[test]
    fn parses_overrides() {
        let yaml = r#"
server:
  listen: "127.0.0.1:9000"
rate_limit:
  enabled: false
  client:
    requests: 3
    window_secs: 10
  global:
    requests: 50
  burst_allowance: 0
  sweep_interval_secs: 30
  trusted_headers: ["X-Real-IP"]
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        let rl = &config.rate_limit;

        assert!(!rl.enabled);
        assert_eq!(rl.client, ScopeLimitConfig { requests: 3, window_secs: 10 });
        assert_eq!(rl.global, ScopeLimitConfig { requests: 50, window_secs: 60 });
        assert_eq!(rl.burst_allowance, 0);
        assert_eq!(rl.sweep_interval_secs, Some(30));
        assert_eq!(rl.trusted_headers, vec!["X-Real-IP".to_string()]);
    }

    #[test]
    fn rejects_zero_limit() {
        let yaml = "rate_limit:\n  client:\n    requests: 0\n";
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("rate_limit.client.requests"));
    }

    #[test]
    fn rejects_zero_window() {
        let yaml = "rate_limit:\n  global:\n    requests: 10\n    window_secs: 0\n";
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("rate_limit.global.window_secs"));
    }

    #[test]
    fn rejects_zero_sweep_interval() {
        let yaml = "rate_limit:\n  sweep_interval_secs: 0\n";
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let err = AppConfig::from_yaml("rate_limit: [").unwrap_err();
        assert!(matches!(err, GeogateError::Yaml(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = AppConfig::load("/nonexistent/geogate.yaml").unwrap_err();
        assert!(matches!(err, GeogateError::Io(_)));
    }
}
