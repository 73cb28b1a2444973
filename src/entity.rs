//! Domain types for a vulnerability check.
//!
//! Everything here is request scoped: built while one `CheckVuln` call runs,
//! handed back to the caller and dropped.

use crate::error::Result;
use crate::validation;
use serde::Serialize;

/// A validated vulnerability check request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    targets: Vec<String>,
    ports: Vec<u16>,
}

impl ScanRequest {
    /// Build a request, rejecting an empty target list or an empty target
    pub fn new(targets: Vec<String>, ports: Vec<u16>) -> Result<Self> {
        validation::validate_targets(&targets)?;
        Ok(Self { targets, ports })
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Requested TCP ports; empty means the engine's default port set
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }
}

/// Scan result for one target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostResult {
    /// First address nmap reported for the host, or the target as requested
    /// when nmap did not report it
    pub target_ip: String,
    pub services: Vec<ServiceResult>,
}

/// An open port whose vulners script produced output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceResult {
    pub name: String,
    pub version: String,
    pub tcp_port: u16,
    pub vulns: Vec<Vulnerability>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vulnerability {
    /// CVE or vendor reference, e.g. `CVE-2018-10933` or `SSV:96273`
    pub identifier: String,
    pub cvss_score: f32,
}
