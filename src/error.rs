//! # Error Handling
//!
//! This module defines the error taxonomy for netvuln. Errors are split in two
//! layers:
//!
//! - [`ScanEngineError`]: what the nmap executor can report. It carries no
//!   policy, it only says whether the engine could not be configured, ran out
//!   of time, or failed while running.
//! - [`VulnScanError`]: what a `CheckVuln` call can fail with. The gRPC adapter
//!   matches on it exhaustively to pick a status code.
//!
//! ## Example
//!
//! ```rust
//! use netvuln::error::{VulnScanError, Result};
//!
//! fn require_targets(targets: &[String]) -> Result<()> {
//!     if targets.is_empty() {
//!         return Err(VulnScanError::client_input("targets is required"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(require_targets(&[]).is_err());
//! ```

use std::io;

/// Errors reported by a scan engine invocation
#[derive(Debug, thiserror::Error)]
pub enum ScanEngineError {
    /// The engine could not be set up with the given parameters
    #[error("Engine configuration error: {0}")]
    Config(String),

    /// The deadline passed before the engine finished
    #[error("Engine timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The engine ran but failed; `warnings` holds the diagnostics it printed
    #[error("Engine execution error: {tool} failed with {message}")]
    Execution {
        tool: String,
        message: String,
        warnings: Vec<String>,
    },
}

impl ScanEngineError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new timeout error
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new execution error
    pub fn execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            tool: tool.into(),
            message: message.into(),
            warnings: Vec::new(),
        }
    }

    /// Attach the engine's diagnostics to an execution error
    pub fn with_warnings(mut self, diagnostics: Vec<String>) -> Self {
        if let Self::Execution { warnings, .. } = &mut self {
            *warnings = diagnostics;
        }
        self
    }

    /// Diagnostics the engine printed before failing
    pub fn warnings(&self) -> &[String] {
        match self {
            Self::Execution { warnings, .. } => warnings.as_slice(),
            Self::Config(_) | Self::Timeout { .. } => &[],
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors returned by a vulnerability check
///
/// `ClientInput` displays the violated rule verbatim, since that text is sent
/// back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum VulnScanError {
    #[error("{0}")]
    ClientInput(String),

    #[error("scan timeout")]
    ScanTimeout,

    #[error("Scan execution error: {0}")]
    ScanExecution(#[source] ScanEngineError),

    #[error("Malformed scan data: {0}")]
    MalformedScanData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Shutdown timed out after {duration_ms}ms")]
    ShutdownTimeout { duration_ms: u64 },
}

impl VulnScanError {
    /// Create a new client input error
    pub fn client_input(msg: impl Into<String>) -> Self {
        Self::ClientInput(msg.into())
    }

    /// Create a new malformed scan data error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedScanData(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias for netvuln operations
pub type Result<T> = std::result::Result<T, VulnScanError>;
