//! Configuration file loading. The original's `GKeyFile` INI groups map
//! 1:1 onto TOML tables of the same name; `config` layers the file under
//! `POOL_DANCE_`-prefixed environment overrides the same way
//! `rill-node`/`rill-explorer` layer their own settings.
use std::path::Path;

use anyhow::{Context, Result};
use pd_core::constants::{
    DEFAULT_LISTEN_ADDR, DEFAULT_LISTEN_PORT, DEFAULT_LOG_FILE, DEFAULT_PID_FILE,
    DEFAULT_POLL_LATENCY_MS, DEFAULT_ROUND_FILE, DEFAULT_WORK_CACHE_SIZE,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub log_file: String,
    pub pid_file: String,
    pub user: Option<String>,
    pub group: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_file: DEFAULT_LOG_FILE.to_string(),
            pid_file: DEFAULT_PID_FILE.to_string(),
            user: None,
            group: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub listen_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            listen_port: DEFAULT_LISTEN_PORT,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }
}

/// No `Default`: a missing upstream URL/credentials is a fatal startup
/// error, not a silently-accepted empty string.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_work_cache_size")]
    pub work_cache_size: usize,
}

fn default_work_cache_size() -> usize {
    DEFAULT_WORK_CACHE_SIZE
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub latency_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { latency_ms: DEFAULT_POLL_LATENCY_MS }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    pub round_file: String,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self { round_file: DEFAULT_ROUND_FILE.to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolDanceConfig {
    #[serde(rename = "pool-dance", default)]
    pub pool: GlobalConfig,
    #[serde(rename = "pool-server", default)]
    pub server: ServerConfig,
    #[serde(rename = "upstream-service")]
    pub upstream: UpstreamConfig,
    #[serde(rename = "block-monitor", default)]
    pub monitor: MonitorConfig,
    #[serde(rename = "round-manager", default)]
    pub round: RoundConfig,
}

impl PoolDanceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(config::Environment::with_prefix("POOL_DANCE").separator("__"));

        builder
            .build()
            .with_context(|| format!("loading configuration from {}", path.display()))?
            .try_deserialize()
            .context("configuration is missing required fields (upstream url/user/password)")
    }
}
