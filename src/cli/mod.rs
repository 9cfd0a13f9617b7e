//! Command-line interface for monodelta.
//!
//! Runs the OTLP metrics receiver with delta translation and a log
//! exporter. Configuration precedence, highest first: CLI flags,
//! environment variables, config file, defaults.

use crate::core::{Config, ConfigBuilder, DeltaError, LogLevel, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{reload, EnvFilter, Registry};

/// Handle for replacing the global log filter after startup
pub type LogFilterHandle = reload::Handle<EnvFilter, Registry>;

const EXPORTER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Convert cumulative OTLP counters into delta counts
#[derive(Parser, Debug)]
#[command(name = "monodelta")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// GRPC port for the OTLP metrics receiver
    #[arg(long, env = "MONODELTA_GRPC_PORT")]
    pub grpc_port: Option<u16>,

    /// Idle time before a series is forgotten (e.g. "1h", "0s" disables)
    #[arg(long, env = "MONODELTA_TTL", value_parser = humantime::parse_duration)]
    pub ttl: Option<Duration>,

    /// Interval between eviction sweeps (e.g. "30m", "0s" disables)
    #[arg(long, env = "MONODELTA_SWEEP_INTERVAL", value_parser = humantime::parse_duration)]
    pub sweep_interval: Option<Duration>,

    /// Maximum number of tracked series
    #[arg(long, env = "MONODELTA_MAX_SERIES")]
    pub max_series: Option<usize>,

    /// Pass cumulative monotonic sums through without conversion
    #[arg(long, env = "MONODELTA_NO_MONOTONIC")]
    pub no_monotonic: bool,

    /// Configuration file path (default: ~/.config/monodelta/config.yaml)
    #[arg(short, long, env = "MONODELTA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "MONODELTA_DEBUG")]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration from file, then apply CLI overrides.
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = match &self.config {
            Some(path) => path.clone(),
            None => {
                let default_path = dirs::config_dir()
                    .map(|d| d.join("monodelta").join("config.yaml"))
                    .unwrap_or_else(|| PathBuf::from("~/.config/monodelta/config.yaml"));
                if !default_path.exists() {
                    return self.build_config_from_args(builder);
                }
                default_path
            },
        };

        match tokio::fs::read_to_string(&config_path).await {
            Ok(content) => {
                builder = builder.from_yaml(&content)?;
                tracing::info!("Loaded configuration from: {:?}", config_path);
            },
            Err(e) if self.config.is_some() => {
                tracing::error!("Failed to read config file {:?}", config_path);
                return Err(DeltaError::Io(e));
            },
            Err(_) => {
                tracing::debug!("No config file found at {:?}, using defaults", config_path);
            },
        }

        self.build_config_from_args(builder)
    }

    fn build_config_from_args(&self, mut builder: ConfigBuilder) -> Result<Config> {
        if let Some(port) = self.grpc_port {
            builder = builder.grpc_port(port);
        }
        if let Some(ttl) = self.ttl {
            builder = builder.ttl(ttl);
        }
        if let Some(interval) = self.sweep_interval {
            builder = builder.sweep_interval(interval);
        }
        if let Some(max) = self.max_series {
            builder = builder.max_series(max);
        }
        if self.no_monotonic {
            builder = builder.send_monotonic(false);
        }

        builder.debug(self.debug).build()
    }

    /// Initialize logging.
    ///
    /// `RUST_LOG` wins, then `--debug`, then `MONODELTA_LOG_LEVEL`. When
    /// none of them is set the filter starts at `info` and the returned
    /// handle lets the configured level replace it once the config is read.
    pub fn init_logging(&self) -> Result<Option<LogFilterHandle>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let env_log_level = std::env::var("MONODELTA_LOG_LEVEL").ok();
        let explicit = if self.debug {
            Some("debug".to_string())
        } else {
            env_log_level
        };

        let (filter, from_config) = match EnvFilter::try_from_default_env() {
            Ok(filter) => (filter, false),
            Err(_) => match &explicit {
                Some(level) => (EnvFilter::new(level), false),
                None => (EnvFilter::new("info"), true),
            },
        };
        let (filter, handle) = reload::Layer::new(filter);

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| DeltaError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(from_config.then_some(handle))
    }
}

/// Swaps the log filter for the level named in the config
pub fn apply_config_level(handle: &LogFilterHandle, level: LogLevel) -> Result<()> {
    handle
        .reload(EnvFilter::new(level.as_str()))
        .map_err(|e| DeltaError::config(format!("Failed to apply log level: {}", e)))
}

/// Execute monodelta.
pub async fn execute(cli: Cli) -> Result<()> {
    let filter_handle = cli.init_logging()?;
    let config = cli.load_config().await?;
    if let Some(handle) = &filter_handle {
        apply_config_level(handle, config.logging.level)?;
    }

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  GRPC port: {}", config.server.grpc_port);
        println!("  Monotonic conversion: {}", config.translator.send_monotonic);
        println!("  Series TTL: {}", humantime::format_duration(config.store.ttl));
        println!(
            "  Sweep interval: {}",
            humantime::format_duration(config.store.sweep_interval)
        );
        println!("  Max series: {}", config.store.max_series);
        return Ok(());
    }

    run(config).await
}

/// Run receiver, sweeper and exporter until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    use crate::export::LogExporter;
    use crate::metrics::{BatchTranslator, PreviousValueStore};
    use crate::receiver::{self, DeltaMetricsReceiver};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    let store = Arc::new(PreviousValueStore::with_config(&config.store));
    let sweeper = PreviousValueStore::spawn_sweeper(&store);

    let translator = Arc::new(BatchTranslator::new(Arc::clone(&store), &config.translator));
    let (tx, rx) = mpsc::channel(config.server.channel_capacity);
    let exporter_handle = tokio::spawn(LogExporter::new().run(rx));

    let receiver = DeltaMetricsReceiver::new(
        translator,
        tx,
        config.translator.resource_attributes_as_tags,
    );
    let addr = SocketAddr::new(config.server.bind_address, config.server.grpc_port);

    tracing::info!("monodelta running");
    tracing::info!("  GRPC receiver on {}", addr);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!("Received shutdown signal, stopping...");
    };

    let served = receiver::serve(receiver, addr, shutdown).await;

    if let Some(sweeper) = sweeper {
        sweeper.stop().await;
    }
    // receiver owned the last sender, so the exporter drains and exits
    match tokio::time::timeout(EXPORTER_DRAIN_TIMEOUT, exporter_handle).await {
        Ok(Ok(stats)) => tracing::info!(
            batches = stats.batches,
            deltas = stats.deltas,
            series = store.len(),
            "Shutdown complete"
        ),
        Ok(Err(e)) => tracing::warn!("Exporter task failed: {}", e),
        Err(_) => tracing::warn!("Exporter did not drain within {:?}", EXPORTER_DRAIN_TIMEOUT),
    }

    served
}
