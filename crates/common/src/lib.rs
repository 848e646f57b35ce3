//! Shared configuration and error types for the geogate workspace.

pub mod config;
pub mod error;

pub use config::{AppConfig, RateLimitConfig, ScopeLimitConfig, ServerConfig};
pub use error::{GeogateError, GeogateResult};
