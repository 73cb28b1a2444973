//! # Structured Logging Module
//!
//! Sets up `tracing` for netvuln and provides the structured log records the
//! scan pipeline emits.
//!
//! ## Features
//!
//! - Levels `error`, `warn`, `info`, `debug`; anything else means `debug`
//! - JSON or human readable console output
//! - Optional rolling log file written through a non-blocking appender
//! - `RUST_LOG` overrides the configured level when set
//!
//! ## Example
//!
//! ```rust,no_run
//! use netvuln::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::default();
//! let _guards = init_logging(&config)?;
//!
//! tracing::info!("gRPC server started");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::constants;
use crate::error::{Result, VulnScanError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Configuration for structured logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (error, warn, info, debug)
    pub level: String,
    /// Whether to output in JSON format
    pub json: bool,
    /// Log file path (optional)
    #[serde(rename = "file")]
    pub file_path: Option<PathBuf>,
    /// Number of rotated log files to keep
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: constants::DEFAULT_LOG_LEVEL.to_string(),
            json: true,
            file_path: None,
            max_files: 5,
        }
    }
}

impl LogConfig {
    /// Map the configured level onto a filter; unknown levels mean debug
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.to_ascii_lowercase().as_str() {
            "error" => LevelFilter::ERROR,
            "warn" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            _ => LevelFilter::DEBUG,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_files == 0 {
            return Err(VulnScanError::config("Max log files must be greater than 0"));
        }

        if let Some(path) = &self.file_path {
            if path.file_name().is_none() {
                return Err(VulnScanError::config(format!(
                    "Log file path has no file name: {}",
                    path.display()
                )));
            }
        }

        Ok(())
    }
}

/// Initialize structured logging with the given configuration
///
/// Returns the worker guards of the file appender; keep them alive for the
/// lifetime of the process or buffered lines are lost.
pub fn init_logging(config: &LogConfig) -> Result<Vec<WorkerGuard>> {
    config.validate()?;

    let mut guards = Vec::new();
    let mut layers = Vec::new();

    let env_filter = || {
        EnvFilter::builder()
            .with_default_directive(config.level_filter().into())
            .from_env_lossy()
    };

    let console_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stdout)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stdout)
            .boxed()
    };
    layers.push(console_layer.with_filter(env_filter()));

    if let Some(file_path) = &config.file_path {
        let prefix = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "netvuln".to_string());

        let file_appender = tracing_appender::rolling::Builder::new()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix(prefix)
            .max_log_files(config.max_files)
            .build(file_path.parent().unwrap_or_else(|| std::path::Path::new(".")))
            .map_err(|e| VulnScanError::config(format!("Failed to create log appender: {}", e)))?;

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        guards.push(guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .boxed();

        layers.push(file_layer.with_filter(env_filter()));
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| VulnScanError::config(format!("Failed to install subscriber: {}", e)))?;

    tracing::info!(
        log_level = %config.level,
        json = config.json,
        file_path = ?config.file_path,
        "Logger initialized"
    );

    Ok(guards)
}

/// Create a span for one vulnerability check
pub fn scan_span(targets: &str, tcp_ports: &str) -> tracing::Span {
    tracing::info_span!(
        "check_vuln",
        targets = %targets,
        tcp_ports = %tcp_ports,
        start_time = %chrono::Utc::now().to_rfc3339()
    )
}

/// Log scan completion with the elapsed time nmap reported
pub fn log_scan_completion(targets: &str, tcp_ports: &str, elapsed_secs: f64) {
    tracing::info!(
        targets = %targets,
        tcp_ports = %tcp_ports,
        elapsed_time = %format!("{:.2} seconds", elapsed_secs),
        "nmap vulners scan done"
    );
}

/// Log external tool execution
pub fn log_external_tool(tool: &str, command: &str, duration_ms: u64, success: bool) {
    if success {
        tracing::debug!(
            tool = %tool,
            command = %command,
            duration_ms = duration_ms,
            "External tool executed successfully"
        );
    } else {
        tracing::warn!(
            tool = %tool,
            command = %command,
            duration_ms = duration_ms,
            "External tool execution failed"
        );
    }
}
