use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{Result, SavantError};

/// Configuration for the Savant video fetcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream site settings
    pub savant: SavantConfig,

    /// Retry policy shared by every request
    pub retry: RetryConfig,

    /// Where downloaded videos go
    pub download: DownloadConfig,

    /// Worker pool sizing
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SavantConfig {
    /// Base URL; `/gf` and `/sporty-videos` are resolved against it
    pub base_url: String,

    /// Timeout for a single request (seconds)
    pub request_timeout_seconds: u64,

    /// User agent sent with every request
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts, including the first
    pub max_attempts: u32,

    /// Constant delay between attempts (milliseconds)
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Directory videos are written to
    pub output_dir: PathBuf,

    /// Longest a video body may go without delivering any bytes (seconds).
    /// Total transfer time is unbounded.
    pub stall_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Absolute cap on in-flight requests per phase
    pub max_workers: usize,

    /// Workers allowed per available CPU
    pub parallelism_multiplier: usize,

    /// Host parallelism used for sizing
    pub available_parallelism: usize,
}

impl Default for SavantConfig {
    fn default() -> Self {
        Self {
            base_url: "https://baseballsavant.mlb.com".to_string(),
            request_timeout_seconds: 30,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_ms: 1000,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./videos"),
            stall_timeout_seconds: 30,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_workers: 16,
            parallelism_multiplier: 4,
            available_parallelism: num_cpus::get(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            savant: SavantConfig::default(),
            retry: RetryConfig::default(),
            download: DownloadConfig::default(),
            performance: PerformanceConfig::default(),
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Config {
    /// Load configuration from the first config file found, then the environment
    pub fn load() -> Result<Self> {
        let config_paths = ["savant-video.toml", "config/savant-video.toml"];

        for path in &config_paths {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| SavantError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Defaults overridden by `SAVANT_VIDEO_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("SAVANT_VIDEO_BASE_URL") {
            config.savant.base_url = base_url;
        }

        if let Ok(output_dir) = std::env::var("SAVANT_VIDEO_OUTPUT_DIR") {
            config.download.output_dir = PathBuf::from(output_dir);
        }

        if let Ok(workers) = std::env::var("SAVANT_VIDEO_MAX_WORKERS") {
            config.performance.max_workers = parse_env("SAVANT_VIDEO_MAX_WORKERS", &workers)?;
        }

        if let Ok(delay) = std::env::var("SAVANT_VIDEO_RETRY_DELAY_MS") {
            config.retry.delay_ms = parse_env("SAVANT_VIDEO_RETRY_DELAY_MS", &delay)?;
        }

        if let Ok(attempts) = std::env::var("SAVANT_VIDEO_MAX_ATTEMPTS") {
            config.retry.max_attempts = parse_env("SAVANT_VIDEO_MAX_ATTEMPTS", &attempts)?;
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config_str =
            toml::to_string_pretty(self).map_err(|e| SavantError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.as_ref().display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(SavantError::Config("max_attempts must be greater than 0".to_string()));
        }

        if self.download.stall_timeout_seconds == 0 {
            return Err(SavantError::Config(
                "stall_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.performance.max_workers == 0 {
            return Err(SavantError::Config("max_workers must be greater than 0".to_string()));
        }

        if self.performance.parallelism_multiplier == 0 {
            return Err(SavantError::Config(
                "parallelism_multiplier must be greater than 0".to_string(),
            ));
        }

        Url::parse(&self.savant.base_url)
            .map_err(|e| SavantError::Config(format!("invalid base_url '{}': {}", self.savant.base_url, e)))?;

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Savant Video Configuration:\n\
            - Base URL: {}\n\
            - Output Directory: {}\n\
            - Retry: {} attempts, {}ms apart\n\
            - Workers: at most {} ({} per CPU, {} CPUs)",
            self.savant.base_url,
            self.download.output_dir.display(),
            self.retry.max_attempts,
            self.retry.delay_ms,
            self.performance.max_workers,
            self.performance.parallelism_multiplier,
            self.performance.available_parallelism,
        )
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| SavantError::Config(format!("{}='{}': {}", name, value, e)))
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.savant.base_url = base_url.into();
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.download.output_dir = dir;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, delay_ms: u64) -> Self {
        self.config.retry.max_attempts = max_attempts;
        self.config.retry.delay_ms = delay_ms;
        self
    }

    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.config.performance.max_workers = workers;
        self
    }

    pub fn with_available_parallelism(mut self, cpus: usize) -> Self {
        self.config.performance.available_parallelism = cpus;
        self
    }

    pub fn with_request_timeout(mut self, seconds: u64) -> Self {
        self.config.savant.request_timeout_seconds = seconds;
        self
    }

    pub fn with_stall_timeout(mut self, seconds: u64) -> Self {
        self.config.download.stall_timeout_seconds = seconds;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
