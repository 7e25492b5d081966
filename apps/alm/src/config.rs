//! # Service Configuration
//!
//! `AppConfig` is resolved in three layers, later layers winning:
//! 1. Built-in defaults
//! 2. An optional TOML file (`--config alm.toml`)
//! 3. Environment variables
//!
//! ## Environment Variables
//!
//! - `ALM_HOST`, `ALM_PORT`: bind address (default `0.0.0.0:8000`)
//! - `ALM_JWT_SECRET_KEY`: HS256 signing secret
//! - `ALM_JWT_ACCESS_TOKEN_EXPIRE_MINUTES`: access token lifetime (default 30)
//! - `ALM_JWT_REFRESH_TOKEN_EXPIRE_DAYS`: refresh token lifetime (default 7)
//! - `ALM_CORS_ORIGINS`: comma-separated origins, or `*`
//! - `ALM_RATE_LIMIT`: inbound requests per second (default 100, 0 disables)
//! - `ALM_CACHE_TTL_SECONDS`: market data cache lifetime (default 3600)
//! - `BRAPI_API_KEY`: optional Brapi bearer token
//! - `BRAPI_RATE_LIMIT_CALLS`, `BRAPI_RATE_LIMIT_PERIOD`: outbound window (default 5 per 60 s)
//! - `BRAPI_BASE_URL`, `COINGECKO_BASE_URL`: provider endpoints

use alm_core::AlmError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Secret used when none is configured. The server warns at startup.
pub const DEFAULT_JWT_SECRET: &str = "alm-development-secret-change-me";

// =============================================================================
// SECTIONS
// =============================================================================

/// Bind address of the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Token signing and lifetimes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret_key: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret_key: DEFAULT_JWT_SECRET.to_string(),
            access_token_expire_minutes: 30,
            refresh_token_expire_days: 7,
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret_key == DEFAULT_JWT_SECRET
    }
}

/// Inbound HTTP policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Comma-separated origins or `*`. `None` allows the local frontend dev servers.
    pub cors_origins: Option<String>,
    /// Requests per second across all clients. 0 disables limiting.
    pub rate_limit: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            cors_origins: None,
            rate_limit: 100,
        }
    }
}

/// Upstream market data providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub brapi_base_url: String,
    pub coingecko_base_url: String,
    pub brapi_api_key: Option<String>,
    pub brapi_rate_limit_calls: usize,
    pub brapi_rate_limit_period_secs: u64,
    pub cache_ttl_seconds: u64,
    pub retries: usize,
    /// Delay before the second attempt; doubles on each further attempt.
    pub retry_backoff_ms: u64,
    pub history_timeout_secs: u64,
    pub price_timeout_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            brapi_base_url: "https://brapi.dev/api".to_string(),
            coingecko_base_url: "https://api.coingecko.com/api/v3".to_string(),
            brapi_api_key: None,
            brapi_rate_limit_calls: 5,
            brapi_rate_limit_period_secs: 60,
            cache_ttl_seconds: 3600,
            retries: 3,
            retry_backoff_ms: 1000,
            history_timeout_secs: 10,
            price_timeout_secs: 5,
        }
    }
}

impl MarketConfig {
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    #[must_use]
    pub const fn rate_limit_period(&self) -> Duration {
        Duration::from_secs(self.brapi_rate_limit_period_secs)
    }
}

// =============================================================================
// APP CONFIG
// =============================================================================

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub http: HttpConfig,
    pub market: MarketConfig,
}

impl AppConfig {
    /// Load defaults, then the TOML file if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, AlmError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, AlmError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AlmError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, AlmError> {
        toml::from_str(content).map_err(|e| AlmError::InvalidInput(format!("Invalid config: {e}")))
    }

    /// Override fields from a variable lookup. Unparseable values are ignored
    /// with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("ALM_HOST") {
            self.server.host = host;
        }
        parse_into(&get, "ALM_PORT", &mut self.server.port);

        if let Some(secret) = get("ALM_JWT_SECRET_KEY") {
            self.auth.jwt_secret_key = secret;
        }
        parse_into(
            &get,
            "ALM_JWT_ACCESS_TOKEN_EXPIRE_MINUTES",
            &mut self.auth.access_token_expire_minutes,
        );
        parse_into(
            &get,
            "ALM_JWT_REFRESH_TOKEN_EXPIRE_DAYS",
            &mut self.auth.refresh_token_expire_days,
        );

        if let Some(origins) = get("ALM_CORS_ORIGINS") {
            self.http.cors_origins = Some(origins);
        }
        parse_into(&get, "ALM_RATE_LIMIT", &mut self.http.rate_limit);

        parse_into(&get, "ALM_CACHE_TTL_SECONDS", &mut self.market.cache_ttl_seconds);
        if let Some(key) = get("BRAPI_API_KEY") {
            self.market.brapi_api_key = Some(key);
        }
        parse_into(&get, "BRAPI_RATE_LIMIT_CALLS", &mut self.market.brapi_rate_limit_calls);
        parse_into(
            &get,
            "BRAPI_RATE_LIMIT_PERIOD",
            &mut self.market.brapi_rate_limit_period_secs,
        );
        if let Some(url) = get("BRAPI_BASE_URL") {
            self.market.brapi_base_url = url;
        }
        if let Some(url) = get("COINGECKO_BASE_URL") {
            self.market.coingecko_base_url = url;
        }
    }
}

fn parse_into<T, G>(get: &G, key: &str, target: &mut T)
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparseable environment value"),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_service_contract() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.access_token_expire_minutes, 30);
        assert_eq!(config.auth.refresh_token_expire_days, 7);
        assert_eq!(config.market.brapi_rate_limit_calls, 5);
        assert_eq!(config.market.cache_ttl(), Duration::from_secs(3600));
        assert!(config.auth.uses_default_secret());
    }

    #[test]
    fn toml_overrides_defaults_partially() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 9000

            [market]
            retries = 5
            "#,
        )
        .expect("valid toml");

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.market.retries, 5);
        assert_eq!(config.market.brapi_base_url, "https://brapi.dev/api");
    }

    #[test]
    fn example_file_parses() {
        let config = AppConfig::from_toml(include_str!("../../../alm.toml.example"))
            .expect("example config");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.http.rate_limit, 100);
        assert!(config.market.brapi_api_key.is_none());
    }

    #[test]
    fn invalid_toml_is_rejected() {
        assert!(AppConfig::from_toml("[server\nport = ").is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = AppConfig::default();
        config.apply_env(lookup(&[
            ("ALM_PORT", "8100"),
            ("ALM_JWT_SECRET_KEY", "s3cret"),
            ("ALM_RATE_LIMIT", "0"),
            ("BRAPI_RATE_LIMIT_CALLS", "10"),
            ("BRAPI_API_KEY", "token"),
        ]));

        assert_eq!(config.server.port, 8100);
        assert_eq!(config.auth.jwt_secret_key, "s3cret");
        assert!(!config.auth.uses_default_secret());
        assert_eq!(config.http.rate_limit, 0);
        assert_eq!(config.market.brapi_rate_limit_calls, 10);
        assert_eq!(config.market.brapi_api_key.as_deref(), Some("token"));
    }

    #[test]
    fn bad_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(lookup(&[("ALM_PORT", "not-a-port"), ("ALM_HOST", "  ")]));
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
