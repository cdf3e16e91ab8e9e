//! API endpoint configuration.
//!
//! The backend base URL comes from the embedding application, typically
//! via the `BACKEND_URL` environment variable. The bearer token is not
//! configuration - it is a per-call parameter owned by the identity
//! layer of the embedding application.

use std::time::Duration;

use anyhow::{Context, Result};

/// Environment variable holding the backend base URL
const BACKEND_URL_VAR: &str = "BACKEND_URL";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the backend, without the `/academic` prefix.
    pub base_url: String,
    pub request_timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Load the configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(BACKEND_URL_VAR)
            .with_context(|| format!("{} is not set", BACKEND_URL_VAR))?;
        Ok(Self::new(base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ApiConfig::new("http://localhost:8080");
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
