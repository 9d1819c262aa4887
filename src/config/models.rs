//! Configuration data structures for the unm gateway.
//!
//! This module defines the schema for the application settings: HTTP server,
//! logging, the distributed cache, rate-limit presets and upstream sources.

use serde::{Deserialize, Serialize};

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP server settings (host, port, workers).
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Distributed cache and local fallback settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Fixed-window rate limiting presets.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Upstream source providers and fallback order.
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Settings for the built-in HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The IP address or hostname the server should bind to.
    /// Default: `127.0.0.1`
    #[serde(default = "default_host")]
    pub host: String,

    /// The port number the server should listen on.
    /// Default: `8080`
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads for the runtime.
    /// Default: Number of logical CPU cores.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Deployment environment. `production` hides internal error detail.
    /// Default: `development`
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Settings for the distributed store and its in-process standby.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether to use the distributed store at all. When false the cache runs local-only.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub redis_enabled: bool,

    /// Full connection string. Takes precedence over host/port/password/db.
    #[serde(default)]
    pub url: Option<String>,

    /// Default: `127.0.0.1`
    #[serde(default = "default_host")]
    pub host: String,

    /// Default: `6379`
    #[serde(default = "default_redis_port")]
    pub port: u16,

    #[serde(default)]
    pub password: Option<String>,

    /// Default: `0`
    #[serde(default)]
    pub db: u32,

    /// Namespace prepended to every distributed key.
    /// Default: `unm:`
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// TTL applied to writes that do not specify one.
    /// Default: `3600`
    #[serde(default = "default_ttl")]
    pub default_ttl_seconds: u64,

    /// Default: `5000`
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// First reconnect delay; doubled on each further failure.
    /// Default: `1000`
    #[serde(default = "default_reconnect_base_delay")]
    pub reconnect_base_delay_ms: u64,

    /// Automatic reconnection stops after this many consecutive failures.
    /// Default: `10`
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Capacity of the local fallback store.
    /// Default: `10000`
    #[serde(default = "default_local_max_entries")]
    pub local_max_entries: usize,

    /// Interval between expiry sweeps of the local store.
    /// Default: `60`
    #[serde(default = "default_local_sweep_interval")]
    pub local_sweep_interval_secs: u64,
}

impl CacheConfig {
    /// Connection string for the distributed store.
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// One rate-limit preset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitRule {
    /// Window size in milliseconds.
    pub window_ms: u64,

    /// Requests admitted per window per client.
    pub max_requests: u64,

    /// Undo the count for responses with status < 400.
    #[serde(default)]
    pub skip_successful_requests: bool,

    /// Undo the count for responses with status >= 400.
    #[serde(default)]
    pub skip_failed_requests: bool,
}

impl RateLimitRule {
    pub fn per_minute(max_requests: u64) -> Self {
        Self {
            window_ms: 60_000,
            max_requests,
            skip_successful_requests: false,
            skip_failed_requests: false,
        }
    }
}

/// Rate limiting presets applied per route group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Default: `true`
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Applied to every request. Default: 60/min
    #[serde(default = "default_global_rule")]
    pub global: RateLimitRule,

    /// Applied to `/api` lookups. Default: 30/min
    #[serde(default = "default_api_rule")]
    pub api: RateLimitRule,

    /// Applied to operator endpoints. Default: 10/min
    #[serde(default = "default_sensitive_rule")]
    pub sensitive: RateLimitRule,

    /// Applied to search. Default: 20/min
    #[serde(default = "default_search_rule")]
    pub search: RateLimitRule,
}

/// One upstream catalog provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Source name used in `server=` lists.
    pub name: String,

    /// Base URL of the provider's JSON API.
    pub base_url: String,

    /// Whether the provider serves lyrics.
    #[serde(default)]
    pub lyric: bool,

    /// Whether the provider serves cover art.
    #[serde(default)]
    pub picture: bool,
}

/// Upstream sources and the default fallback order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Order used when a request does not name its sources.
    #[serde(default = "default_source_order")]
    pub default_order: Vec<String>,

    /// Per-call timeout for a single provider operation.
    /// Default: `10000`
    #[serde(default = "default_provider_timeout")]
    pub timeout_ms: u64,

    /// Registered providers.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

// Default trait implementations linking to custom logic

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            environment: default_environment(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_enabled: true,
            url: None,
            host: default_host(),
            port: default_redis_port(),
            password: None,
            db: 0,
            key_prefix: default_key_prefix(),
            default_ttl_seconds: default_ttl(),
            connect_timeout_ms: default_connect_timeout(),
            reconnect_base_delay_ms: default_reconnect_base_delay(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            local_max_entries: default_local_max_entries(),
            local_sweep_interval_secs: default_local_sweep_interval(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global: default_global_rule(),
            api: default_api_rule(),
            sensitive: default_sensitive_rule(),
            search: default_search_rule(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            default_order: default_source_order(),
            timeout_ms: default_provider_timeout(),
            providers: Vec::new(),
        }
    }
}

// Helper functions for serde defaults and shared constants
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_key_prefix() -> String {
    "unm:".to_string()
}

fn default_ttl() -> u64 {
    3600
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_reconnect_base_delay() -> u64 {
    1000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_local_max_entries() -> usize {
    10_000
}

fn default_local_sweep_interval() -> u64 {
    60
}

fn default_global_rule() -> RateLimitRule {
    RateLimitRule::per_minute(60)
}

fn default_api_rule() -> RateLimitRule {
    RateLimitRule::per_minute(30)
}

fn default_sensitive_rule() -> RateLimitRule {
    RateLimitRule::per_minute(10)
}

fn default_search_rule() -> RateLimitRule {
    RateLimitRule::per_minute(20)
}

fn default_source_order() -> Vec<String> {
    vec![
        "kuwo".to_string(),
        "kugou".to_string(),
        "migu".to_string(),
        "bilibili".to_string(),
    ]
}

fn default_provider_timeout() -> u64 {
    10_000
}
