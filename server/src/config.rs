use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Command-line flags. Every flag is optional so that an omitted flag never
/// shadows a value from the TOML file or the environment.
#[derive(Parser, Serialize, Debug, Clone, Default)]
#[command(name = "dotdash-server", version, about = "DOT/DASH signaling hub")]
pub struct CliArgs {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, default_value = "./dotdash.toml")]
    #[serde(skip)]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,
}

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,

    pub bind_address: String,

    #[serde(default)]
    pub json_logs: bool,

    /// Credential store configuration (loaded from [credentials] section in TOML)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<CredentialsConfig>,

    /// Receiver connection configuration (loaded from [ws] section in TOML)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws: Option<WsConfig>,

    /// Rate limit for device registration (loaded from [rate_limit] section in TOML)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,
}

/// Which key-value backend holds device credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
    Redis,
}

/// Configuration for credential issuance and storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Storage backend: "memory", "sqlite" or "redis" (default: memory)
    #[serde(default)]
    pub backend: StoreBackend,

    /// Data directory for the SQLite database (default: ./data)
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Redis server for the redis backend (default: redis://localhost:6379)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Credential lifetime in seconds (default: 1800 = 30 minutes)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Interval in seconds between expired-credential purges (default: 300, 0 disables)
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl CredentialsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            data_dir: default_data_dir(),
            redis_url: default_redis_url(),
            ttl_secs: default_ttl_secs(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

/// Configuration for receiver WebSocket connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    /// Seconds between server pings (default: 30, 0 disables keepalive)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before closing (default: 10, minimum 1)
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
}

impl WsConfig {
    pub fn ping_interval(&self) -> Option<Duration> {
        (self.ping_interval_secs > 0).then(|| Duration::from_secs(self.ping_interval_secs))
    }

    /// A zero timeout would fail every round trip, so it is raised to one second.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs.max(1))
    }
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval(),
            pong_timeout_secs: default_pong_timeout(),
        }
    }
}

/// Per-IP rate limit on /register_device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds to replenish one request slot (default: 6 = 10 per minute)
    #[serde(default = "default_rate_period")]
    pub period_secs: u64,

    /// Requests allowed in a burst (default: 10)
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period_secs: default_rate_period(),
            burst_size: default_burst_size(),
        }
    }
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_ttl_secs() -> u64 {
    1800
}

fn default_purge_interval() -> u64 {
    300
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_rate_period() -> u64 {
    6
}

fn default_burst_size() -> u32 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            credentials: Some(CredentialsConfig::default()),
            ws: Some(WsConfig::default()),
            rate_limit: Some(RateLimitConfig::default()),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (DOTDASH_*) < CLI args
    pub fn load(cli: &CliArgs) -> Result<Self, figment::Error> {
        Self::figment(cli).extract()
    }

    /// Nested keys come from env with a double underscore,
    /// e.g. `DOTDASH_CREDENTIALS__BACKEND=sqlite`.
    pub fn figment(cli: &CliArgs) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("DOTDASH_").split("__"))
            .merge(Serialized::defaults(cli))
    }

    pub fn credentials(&self) -> CredentialsConfig {
        self.credentials.clone().unwrap_or_default()
    }

    pub fn ws(&self) -> WsConfig {
        self.ws.clone().unwrap_or_default()
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        self.rate_limit.clone().unwrap_or_default()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# dotdash signaling hub configuration
# Place this file at ./dotdash.toml or specify with --config <path>
# All settings can be overridden via environment variables (DOTDASH_PORT,
# DOTDASH_CREDENTIALS__BACKEND, etc.) or CLI flags (--port, etc.)

# Server port (default: 8000)
# port = 8000

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# ---- Device Credentials ----
# [credentials]

# Storage backend: "memory" (lost on restart), "sqlite" or "redis"
# (redis lets several server processes share credentials)
# backend = "memory"

# Data directory for the SQLite credential database
# data_dir = "./data"

# Redis server for the redis backend (env: DOTDASH_CREDENTIALS__REDIS_URL)
# redis_url = "redis://localhost:6379"

# Credential lifetime in seconds (default: 1800 = 30 minutes)
# ttl_secs = 1800

# Seconds between purges of expired credentials (0 disables)
# purge_interval_secs = 300

# ---- Receiver Connections ----
# [ws]

# Server ping interval in seconds (0 disables keepalive pings)
# ping_interval_secs = 30

# Close the connection if no pong arrives within this many seconds (minimum 1)
# pong_timeout_secs = 10

# ---- Registration Rate Limit (per client IP) ----
# [rate_limit]
# enabled = true
# period_secs = 6     # one request slot replenished every 6 seconds
# burst_size = 10
"#
    .to_string()
}
