//! Configuration management for monodelta.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Environment variable and CLI overrides (applied by `cli`)
//! - Validation and defaults

use crate::core::{DeltaError, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Complete configuration for monodelta
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Receiver configuration
    pub server: ServerConfig,
    /// Delta translation configuration
    pub translator: TranslatorConfig,
    /// Previous-value store configuration
    pub store: StoreConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Receiver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// GRPC port for the OTLP metrics receiver
    pub grpc_port: u16,
    /// Bind address for the receiver
    pub bind_address: IpAddr,
    /// Capacity of the channel carrying translated batches downstream
    pub channel_capacity: usize,
}

/// Delta translation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Convert cumulative monotonic sums into deltas.
    /// When disabled they pass through unchanged.
    pub send_monotonic: bool,
    /// Merge resource attributes into every point's tag set
    pub resource_attributes_as_tags: bool,
}

/// Previous-value store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Idle time after which a series is forgotten. Zero disables eviction.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// How often the eviction sweep runs. Zero disables eviction.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Maximum number of tracked series
    pub max_series: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including per-point tracing
    Trace,
    /// Resets, stale and skipped points
    Debug,
    /// Lifecycle and emitted deltas
    Info,
    /// Dropped metrics and store failures
    Warn,
    /// Fatal problems only
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            translator: TranslatorConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
            debug: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            grpc_port: 4317,
            bind_address: IpAddr::from([0, 0, 0, 0]),
            channel_capacity: 1024,
        }
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        TranslatorConfig {
            send_monotonic: true,
            resource_attributes_as_tags: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            ttl: Duration::from_secs(3600),            // 1 hour
            sweep_interval: Duration::from_secs(1800), // 30 minutes
            max_series: 1_048_576,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
        }
    }
}

impl StoreConfig {
    /// Whether the background sweep should run at all
    pub fn eviction_enabled(&self) -> bool {
        !self.ttl.is_zero() && !self.sweep_interval.is_zero()
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.store.max_series == 0 {
            return Err(DeltaError::config("max_series must be greater than 0"));
        }

        if self.server.channel_capacity == 0 {
            return Err(DeltaError::config("channel_capacity must be greater than 0"));
        }

        if self.server.grpc_port == 0 {
            return Err(DeltaError::config("grpc_port must be greater than 0"));
        }

        if !self.store.eviction_enabled() {
            tracing::debug!(
                ttl = ?self.store.ttl,
                sweep_interval = ?self.store.sweep_interval,
                "Series eviction disabled, previous values are kept for the process lifetime"
            );
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| DeltaError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set GRPC port
    pub fn grpc_port(mut self, port: u16) -> Self {
        self.config.server.grpc_port = port;
        self
    }

    /// Set series time-to-live
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.store.ttl = ttl;
        self
    }

    /// Set sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.store.sweep_interval = interval;
        self
    }

    /// Set maximum tracked series
    pub fn max_series(mut self, count: usize) -> Self {
        self.config.store.max_series = count;
        self
    }

    /// Enable or disable monotonic delta conversion
    pub fn send_monotonic(mut self, enable: bool) -> Self {
        self.config.translator.send_monotonic = enable;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
