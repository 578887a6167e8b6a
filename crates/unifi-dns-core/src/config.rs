//! Configuration types for the UniFi DNS webhook
//!
//! This module defines all configuration structures used throughout the
//! workspace, their defaults, validation, and loading from `WEBHOOK_*`
//! environment variables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::{ConcurrencyLimiter, DEFAULT_MAX_CONCURRENCY, DEFAULT_OPERATION_TIMEOUT};
use crate::filter::DomainFilter;
use crate::readiness::DEFAULT_READINESS_TTL;

/// Prefix shared by every environment variable
pub const ENV_PREFIX: &str = "WEBHOOK_";

/// Main webhook configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// UniFi controller connection
    #[serde(default)]
    pub unifi: UnifiConfig,

    /// Webhook protocol listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Health/readiness/metrics listener
    #[serde(default = "default_health")]
    pub health: ServerConfig,

    /// Which names are managed
    #[serde(default)]
    pub domain_filter: DomainFilterConfig,

    /// Log level and format
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Reconciliation engine tuning
    #[serde(default)]
    pub engine: EngineConfig,
}

impl WebhookConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, crate::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Keys are the full variable names (e.g. `WEBHOOK_UNIFI_HOST`). Unset
    /// keys keep their defaults; set keys that fail to parse are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, crate::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader {
            lookup: &lookup,
        };
        let mut config = Self::default();

        env.string("UNIFI_HOST", &mut config.unifi.host);
        env.string("UNIFI_API_KEY", &mut config.unifi.api_key);
        env.string("UNIFI_SITE", &mut config.unifi.site);
        env.parse("UNIFI_SKIP_TLS_VERIFY", &mut config.unifi.skip_tls_verify)?;

        env.string("SERVER_HOST", &mut config.server.host);
        env.parse("SERVER_PORT", &mut config.server.port)?;
        env.string("HEALTH_HOST", &mut config.health.host);
        env.parse("HEALTH_PORT", &mut config.health.port)?;

        env.list("DOMAIN_FILTER_FILTERS", &mut config.domain_filter.filters);
        env.list(
            "DOMAIN_FILTER_EXCLUDE_FILTERS",
            &mut config.domain_filter.exclude_filters,
        );

        env.string("LOGGING_LEVEL", &mut config.logging.level);
        env.parse("LOGGING_FORMAT", &mut config.logging.format)?;

        env.parse("ENGINE_MAX_CONCURRENCY", &mut config.engine.max_concurrency)?;
        env.parse(
            "ENGINE_OPERATION_TIMEOUT_SECS",
            &mut config.engine.operation_timeout_secs,
        )?;
        env.parse(
            "ENGINE_READINESS_TTL_SECS",
            &mut config.engine.readiness_ttl_secs,
        )?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.unifi.validate()?;
        self.server.validate("server")?;
        self.health.validate("health")?;
        self.logging.validate()?;
        self.engine.validate()?;

        if self.server.host == self.health.host && self.server.port == self.health.port {
            return Err(crate::Error::config(format!(
                "server and health listeners both bind {}:{}",
                self.server.host, self.server.port
            )));
        }

        Ok(())
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            unifi: UnifiConfig::default(),
            server: ServerConfig::default(),
            health: default_health(),
            domain_filter: DomainFilterConfig::default(),
            logging: LoggingConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

/// UniFi controller connection settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiConfig {
    /// Controller base URL
    #[serde(default = "default_unifi_host")]
    pub host: String,

    /// API key sent as `X-API-KEY`
    #[serde(default)]
    pub api_key: String,

    /// Site (controller tenant)
    #[serde(default = "default_site")]
    pub site: String,

    /// Accept invalid TLS certificates (self-signed controllers)
    #[serde(default)]
    pub skip_tls_verify: bool,
}

impl UnifiConfig {
    /// Validate the UniFi settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.host.is_empty() {
            return Err(crate::Error::config("UniFi host cannot be empty"));
        }
        if !self.host.starts_with("https://") && !self.host.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "UniFi host must use HTTP or HTTPS scheme. Got: {}",
                self.host
            )));
        }
        if self.api_key.is_empty() {
            return Err(crate::Error::config(
                "UniFi API key is required. Set it via: export WEBHOOK_UNIFI_API_KEY=your_key",
            ));
        }
        if self.site.is_empty() {
            return Err(crate::Error::config("UniFi site cannot be empty"));
        }
        Ok(())
    }
}

impl Default for UnifiConfig {
    fn default() -> Self {
        Self {
            host: default_unifi_host(),
            api_key: String::new(),
            site: default_site(),
            skip_tls_verify: false,
        }
    }
}

impl fmt::Debug for UnifiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnifiConfig")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .field("site", &self.site)
            .field("skip_tls_verify", &self.skip_tls_verify)
            .finish()
    }
}

/// Listener address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
}

impl ServerConfig {
    /// Validate one listener
    pub fn validate(&self, which: &str) -> Result<(), crate::Error> {
        if self.host.is_empty() {
            return Err(crate::Error::config(format!("{which} host cannot be empty")));
        }
        if self.port == 0 {
            return Err(crate::Error::config(format!("{which} port must be > 0")));
        }
        Ok(())
    }

    /// `host:port` form accepted by socket binders
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8888,
        }
    }
}

fn default_health() -> ServerConfig {
    ServerConfig {
        host: "0.0.0.0".to_string(),
        port: 8080,
    }
}

/// Include/exclude domain lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFilterConfig {
    /// Managed domains; empty manages everything
    #[serde(default)]
    pub filters: Vec<String>,

    /// Domains never managed
    #[serde(default)]
    pub exclude_filters: Vec<String>,
}

impl DomainFilterConfig {
    /// Build the runtime filter
    pub fn build(&self) -> DomainFilter {
        DomainFilter::new(&self.filters, &self.exclude_filters)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable text
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            other => Err(format!("'{other}' is not valid. Valid formats: json, text")),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level name
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Validate the logging settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(crate::Error::config(format!(
                "logging level '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                self.level
            ))),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of remote mutations in flight
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Deadline for one endpoint's remote work (in seconds)
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,

    /// How long a readiness probe result is reused (in seconds)
    ///
    /// Set to 0 to probe on every readiness request.
    #[serde(default = "default_readiness_ttl_secs")]
    pub readiness_ttl_secs: u64,
}

impl EngineConfig {
    /// Validate the engine settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(1..=100).contains(&self.max_concurrency) {
            return Err(crate::Error::config(format!(
                "engine max_concurrency must be between 1 and 100. Got: {}",
                self.max_concurrency
            )));
        }
        if self.operation_timeout_secs == 0 {
            return Err(crate::Error::config("engine operation timeout must be > 0"));
        }
        Ok(())
    }

    /// Per-unit deadline
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Readiness cache TTL
    pub fn readiness_ttl(&self) -> Duration {
        Duration::from_secs(self.readiness_ttl_secs)
    }

    /// Build the limiter these settings describe
    pub fn limiter(&self) -> ConcurrencyLimiter {
        ConcurrencyLimiter::new(self.max_concurrency, self.operation_timeout())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            operation_timeout_secs: default_operation_timeout_secs(),
            readiness_ttl_secs: default_readiness_ttl_secs(),
        }
    }
}

fn default_unifi_host() -> String {
    "https://unifi.local".to_string()
}

fn default_site() -> String {
    "default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_operation_timeout_secs() -> u64 {
    DEFAULT_OPERATION_TIMEOUT.as_secs()
}

fn default_readiness_ttl_secs() -> u64 {
    DEFAULT_READINESS_TTL.as_secs()
}

/// Typed access to `WEBHOOK_*` keys through a lookup function
struct EnvReader<'a, F> {
    lookup: &'a F,
}

impl<F> EnvReader<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(&format!("{ENV_PREFIX}{key}"))
    }

    fn string(&self, key: &str, slot: &mut String) {
        if let Some(value) = self.get(key) {
            *slot = value.trim().to_string();
        }
    }

    fn list(&self, key: &str, slot: &mut Vec<String>) {
        if let Some(value) = self.get(key) {
            *slot = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }

    fn parse<T>(&self, key: &str, slot: &mut T) -> Result<(), crate::Error>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        if let Some(value) = self.get(key) {
            *slot = value.trim().parse().map_err(|e| {
                crate::Error::config(format!("{ENV_PREFIX}{key}: {e}"))
            })?;
        }
        Ok(())
    }
}
