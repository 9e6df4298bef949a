use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fanout: FanoutConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Artificial delay range for `/api/proxy`, in milliseconds.
    #[serde(default = "default_simulated_latency")]
    pub simulated_latency_ms: (u64, u64),
    /// Requests allowed per client address per window on `/api/*`.
    #[serde(default = "default_client_rate_limit")]
    pub client_rate_limit: u32,
    #[serde(default = "default_client_rate_window")]
    pub client_rate_window_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            environment: default_environment(),
            simulated_latency_ms: default_simulated_latency(),
            client_rate_limit: default_client_rate_limit(),
            client_rate_window_secs: default_client_rate_window(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3001".to_string()
}
fn default_environment() -> String {
    "development".to_string()
}
fn default_simulated_latency() -> (u64, u64) {
    (500, 2500)
}
fn default_client_rate_limit() -> u32 {
    1000
}
fn default_client_rate_window() -> u64 {
    15 * 60
}

#[derive(Debug, Deserialize, Clone)]
pub struct FanoutConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    /// Overall deadline for one gather; 0 disables it.
    #[serde(default)]
    pub gather_timeout_ms: u64,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            gather_timeout_ms: 0,
        }
    }
}

impl FanoutConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn gather_timeout(&self) -> Option<Duration> {
        (self.gather_timeout_ms > 0).then(|| Duration::from_millis(self.gather_timeout_ms))
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_attempt_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Limit for sources without an explicit entry.
    #[serde(default = "default_source_limit")]
    pub default_limit: u32,
    /// Per-source overrides, keyed by source id.
    #[serde(default)]
    pub limits: HashMap<String, u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            default_limit: default_source_limit(),
            limits: HashMap::new(),
        }
    }
}

fn default_window_secs() -> u64 {
    60
}
fn default_source_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: u64,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_capacity() -> u64 {
    500
}
fn default_cache_ttl() -> u64 {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_query_chars: default_max_query_chars(),
            history_size: default_history_size(),
        }
    }
}

fn default_max_query_chars() -> usize {
    2000
}
fn default_history_size() -> usize {
    50
}

impl Config {
    /// Configuration used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate fan-out
    if config.fanout.max_attempts == 0 {
        anyhow::bail!("fanout.max_attempts must be >= 1");
    }
    if config.fanout.attempt_timeout_ms == 0 {
        anyhow::bail!("fanout.attempt_timeout_ms must be > 0");
    }

    // Validate rate limiting
    if config.rate_limit.window_secs == 0 {
        anyhow::bail!("rate_limit.window_secs must be > 0");
    }
    if config.server.client_rate_limit == 0 {
        anyhow::bail!("server.client_rate_limit must be > 0");
    }
    if config.server.client_rate_window_secs == 0 {
        anyhow::bail!("server.client_rate_window_secs must be > 0");
    }

    let (min, max) = config.server.simulated_latency_ms;
    if min > max {
        anyhow::bail!("server.simulated_latency_ms min must be <= max");
    }

    // Validate cache
    if config.cache.capacity == 0 {
        anyhow::bail!("cache.capacity must be > 0");
    }
    if config.cache.ttl_secs == 0 {
        anyhow::bail!("cache.ttl_secs must be > 0");
    }

    if config.analysis.max_query_chars == 0 {
        anyhow::bail!("analysis.max_query_chars must be > 0");
    }

    Ok(())
}
