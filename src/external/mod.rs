//! # External Tool Integration
//!
//! This module wraps the external scanning engine. It provides:
//!
//! - [`BaseTool`]: locates a binary on `PATH` and runs it once, bounded by an
//!   absolute deadline. The child is killed if the deadline passes.
//! - [`ScanParameters`]: the immutable description of one scan.
//! - [`ScanEngine`]: the seam the service talks to. [`nmap::NmapScanner`] is
//!   the production implementation; tests plug in fixtures.
//!
//! ## Example
//!
//! ```rust,no_run
//! use netvuln::external::BaseTool;
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tool = BaseTool::new("echo")?;
//!     let deadline = Instant::now() + Duration::from_secs(5);
//!     let output = tool.execute_command(&["hello"], deadline).await?;
//!
//!     println!("Output: {}", String::from_utf8_lossy(&output.stdout));
//!     Ok(())
//! }
//! ```

pub mod nmap;

use crate::constants;
use crate::error::ScanEngineError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::time::Instant;

pub use nmap::{NmapRun, NmapScanner};

/// Raw result of one engine run
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub run: NmapRun,
    /// Non-fatal diagnostics printed by the engine
    pub warnings: Vec<String>,
}

/// A scan engine the vulnerability service can delegate to
#[async_trait]
pub trait ScanEngine: Send + Sync {
    /// Run one scan. Must return [`ScanEngineError::Timeout`] once the
    /// deadline in `params` has passed.
    async fn execute(&self, params: &ScanParameters) -> Result<ScanOutcome, ScanEngineError>;
}

/// Immutable configuration for a single scan
#[derive(Debug, Clone)]
pub struct ScanParameters {
    targets: Vec<String>,
    ports: Vec<u16>,
    script_path: PathBuf,
    service_detection: bool,
    deadline: Instant,
}

impl ScanParameters {
    pub fn new(
        targets: Vec<String>,
        ports: Vec<u16>,
        script_path: impl Into<PathBuf>,
        deadline: Instant,
    ) -> Self {
        Self {
            targets,
            ports,
            script_path: script_path.into(),
            service_detection: true,
            deadline,
        }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Requested TCP ports; empty means the engine's default port set
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// Ports joined with `separator`, e.g. `22,80` for nmap's `-p`
    pub fn port_list(&self, separator: &str) -> String {
        self.ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(separator)
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn service_detection(&self) -> bool {
        self.service_detection
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Id under which the engine reports this script's output
    ///
    /// nmap uses the script file name without the `.nse` extension.
    pub fn script_id(&self) -> &str {
        self.script_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .unwrap_or(constants::VULNERS_SCRIPT_ID)
    }
}

/// Base implementation for external tool execution
#[derive(Debug, Clone)]
pub struct BaseTool {
    pub name: &'static str,
    pub binary_path: String,
}

impl BaseTool {
    pub fn new(name: &'static str) -> Result<Self, ScanEngineError> {
        let binary_path = Self::find_binary(name)?;
        Ok(Self { name, binary_path })
    }

    /// Use a binary at a known location instead of searching `PATH`
    pub fn with_path(name: &'static str, binary_path: impl Into<String>) -> Self {
        Self {
            name,
            binary_path: binary_path.into(),
        }
    }

    fn find_binary(name: &str) -> Result<String, ScanEngineError> {
        use std::process::Command;

        let output = Command::new("which")
            .arg(name)
            .output()
            .map_err(|e| ScanEngineError::config(format!("which {}: {}", name, e)))?;

        if !output.status.success() {
            return Err(ScanEngineError::config(format!(
                "{}: tool not found in PATH",
                name
            )));
        }

        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if path.is_empty() {
            return Err(ScanEngineError::config(format!("{}: tool path is empty", name)));
        }

        Ok(path)
    }

    pub async fn execute_command(
        &self,
        args: &[&str],
        deadline: Instant,
    ) -> Result<Output, ScanEngineError> {
        use tokio::process::Command;
        use tokio::time::timeout_at;

        let started = Instant::now();

        let mut cmd = Command::new(&self.binary_path);
        cmd.args(args).kill_on_drop(true);

        let output = timeout_at(deadline, cmd.output()).await.map_err(|_| {
            ScanEngineError::timeout(deadline.saturating_duration_since(started).as_millis() as u64)
        })?;

        output.map_err(|e| ScanEngineError::execution(self.name, e.to_string()))
    }
}
