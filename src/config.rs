//! # Configuration Management
//!
//! netvuln reads a YAML file and then applies environment overrides:
//!
//! | YAML key                 | Environment             | Default |
//! |--------------------------|-------------------------|---------|
//! | `grpc.port`              | `GRPC_PORT`             | `3000`  |
//! | `logger.level`           | `LOGGER_LEVEL`          | `debug` |
//! | `logger.json`            |                         | `true`  |
//! | `logger.file`            |                         | none    |
//! | `vulners.check_timeout`  | `VULNERS_CHECK_TIMEOUT` | `1m`    |
//!
//! Durations are written as unit sequences such as `1m`, `90s`, `1m30s` or
//! `500ms`.
//!
//! ## Example
//!
//! ```rust
//! use netvuln::config::Config;
//! use std::time::Duration;
//!
//! let config = Config::from_yaml("grpc:\n  port: 50051\nvulners:\n  check_timeout: 2m\n")?;
//!
//! assert_eq!(config.grpc.port, 50051);
//! assert_eq!(config.vulners.check_timeout, Duration::from_secs(120));
//! assert_eq!(config.logger.level, "debug");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::constants;
use crate::error::{Result, VulnScanError};
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grpc: GrpcConfig,
    pub logger: LogConfig,
    pub vulners: VulnersConfig,
}

/// gRPC server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrpcConfig {
    /// Port to listen on, all interfaces
    pub port: u16,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            port: constants::DEFAULT_GRPC_PORT,
        }
    }
}

/// Vulnerability check settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VulnersConfig {
    /// Upper bound on a single check
    #[serde(with = "duration_str")]
    pub check_timeout: Duration,
}

impl Default for VulnersConfig {
    fn default() -> Self {
        Self {
            check_timeout: Duration::from_secs(constants::DEFAULT_CHECK_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Read the YAML file at `path` and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::from_file(path)?.merge_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            VulnScanError::config(format!(
                "config reading yaml file {} error: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document means "all defaults".
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| VulnScanError::config(format!("config parsing yaml file error: {}", e)))
    }

    /// Apply `GRPC_PORT`, `LOGGER_LEVEL` and `VULNERS_CHECK_TIMEOUT`
    pub fn merge_env(self) -> Result<Self> {
        self.merge_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn merge_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("GRPC_PORT") {
            self.grpc.port = port.trim().parse::<u16>().map_err(|e| {
                VulnScanError::config(format!(
                    "environment variable GRPC_PORT converting error: {}",
                    e
                ))
            })?;
        }

        if let Some(level) = lookup("LOGGER_LEVEL") {
            self.logger.level = level;
        }

        if let Some(timeout) = lookup("VULNERS_CHECK_TIMEOUT") {
            self.vulners.check_timeout = parse_duration(&timeout).map_err(|e| {
                VulnScanError::config(format!(
                    "environment variable VULNERS_CHECK_TIMEOUT parsing error: {}",
                    e
                ))
            })?;
        }

        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.vulners.check_timeout.is_zero() {
            return Err(VulnScanError::config(
                "vulners.check_timeout must be greater than 0",
            ));
        }
        self.logger.validate()
    }
}

/// Parse a duration written as a sequence of `<number><unit>` pairs
///
/// Units: `h`, `m`, `s`, `ms`, `us` (or `µs`), `ns`. A bare `0` is allowed.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || VulnScanError::config(format!("invalid duration {:?}", input));

    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid());
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut total_nanos = 0f64;

    while !rest.is_empty() {
        let number_len = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        if number_len == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest.find(is_number).unwrap_or(rest.len());
        let factor = match &rest[..unit_len] {
            "h" => 3_600_000_000_000.0,
            "m" => 60_000_000_000.0,
            "s" => 1_000_000_000.0,
            "ms" => 1_000_000.0,
            "us" | "µs" => 1_000.0,
            "ns" => 1.0,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];

        total_nanos += value * factor;
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Render a duration in the format [`parse_duration`] accepts
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else if duration.subsec_nanos() % 1_000_000 == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{}ns", duration.as_nanos())
    }
}

mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
