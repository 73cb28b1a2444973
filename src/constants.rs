//! # Configuration Constants
//!
//! Defaults and fixed names used across netvuln: the scan timeout, the gRPC
//! port, the nmap script id that carries vulnerability tables and the element
//! keys read from it.

/// Default bound on a single vulnerability check in seconds
pub const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 60;

/// Default gRPC listen port
pub const DEFAULT_GRPC_PORT: u16 = 3000;

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "debug";

/// Time allowed for in-flight requests to drain on shutdown, in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Name of the external scanning engine binary
pub const NMAP_BINARY: &str = "nmap";

/// Script id used when the script path has no usable file stem
pub const VULNERS_SCRIPT_ID: &str = "vulners";

/// Element keys inside a vulners result table
pub mod vulners_keys {
    /// Vulnerability identifier (CVE or vendor id)
    pub const ID: &str = "id";
    /// CVSS score as a decimal string
    pub const CVSS: &str = "cvss";
}

/// gRPC status messages sent back to callers
pub mod messages {
    pub const TARGETS_REQUIRED: &str = "targets is required";
    pub const EMPTY_TARGET: &str = "target cannot be an empty string";
    pub const CHECK_FAILED: &str = "failed to check vulnerability";
}

/// Input validation
pub mod validation {
    /// Maximum target string length
    pub const MAX_TARGET_LENGTH: usize = 253;
}
