use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const ENV_REQUEST_TIMEOUT_MS: &str = "RPC_REQUEST_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "RPC_LOG_LEVEL";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClientConfig {
    pub request_timeout_ms: Option<u64>, // None waits for the peer indefinitely
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ServerConfig {
    /// Upper bound on handlers running at once, 0 for no bound
    #[serde(default)]
    pub max_concurrent_handlers: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransportConfig {
    pub channel_capacity: usize,
    pub max_line_length: usize,
    /// Items replayed to late subscribers of a shared inbound stream
    #[serde(default)]
    pub replay: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: Some(30_000),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            max_line_length: 10 * 1024 * 1024,
            replay: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None, // Default to None, will use system temp directory
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

impl Config {
    /// Default location of the config file: `<config dir>/rpcterm/config.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("rpcterm");
        path.push("config.json");
        path
    }

    /// Load the config from `config_path` (or the default location), then
    /// apply overrides from the process environment.
    ///
    /// A missing file yields the defaults, which are written out so they can
    /// be edited. Failing to write them is not an error.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(config_path, |name| std::env::var(name).ok())
    }

    /// [`load`](Self::load) with overrides read through `lookup` instead of
    /// the process environment
    pub fn load_with_env<F>(config_path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);

        let mut config = if config_path.exists() {
            let config_str = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            serde_json::from_str(&config_str)
                .with_context(|| format!("Invalid config file {}", config_path.display()))?
        } else {
            let config = Config::default();
            if let Err(e) = config.save(&config_path) {
                warn!("Could not write default config: {:#}", e);
            }
            config
        };

        config.apply_overrides(lookup)?;
        debug!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let config_str = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_str)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        Ok(())
    }

    /// Apply `RPC_REQUEST_TIMEOUT_MS` and `RPC_LOG_LEVEL` as resolved by
    /// `lookup`. A timeout of 0 disables the request timeout.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(timeout) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            let ms: u64 = timeout
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of milliseconds", ENV_REQUEST_TIMEOUT_MS))?;
            self.client.request_timeout_ms = if ms == 0 { None } else { Some(ms) };
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        Ok(())
    }
}
