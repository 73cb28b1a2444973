//! # Input Validation Module
//!
//! Two levels of checks live here:
//!
//! - **Request validation**: the rules a `CheckVuln` request must satisfy
//!   before any scan starts. Violations are client input errors whose message
//!   is returned to the caller unchanged.
//! - **Engine argument validation**: checks applied to targets before they
//!   end up on the nmap command line. Violations are engine configuration
//!   errors.
//!
//! ## Example
//!
//! ```rust
//! use netvuln::validation::*;
//!
//! assert!(validate_targets(&["127.0.0.1".to_string()]).is_ok());
//! assert!(validate_targets(&[]).is_err());
//! assert_eq!(validate_tcp_ports(&[22, 80]).unwrap(), vec![22, 80]);
//! assert!(validate_target_for_engine("-oN").is_err());
//! ```

use crate::constants;
use crate::error::{Result, ScanEngineError, VulnScanError};

/// Validates the target list of a request
pub fn validate_targets(targets: &[String]) -> Result<()> {
    if targets.is_empty() {
        return Err(VulnScanError::client_input(
            constants::messages::TARGETS_REQUIRED,
        ));
    }

    if targets.iter().any(|target| target.is_empty()) {
        return Err(VulnScanError::client_input(
            constants::messages::EMPTY_TARGET,
        ));
    }

    Ok(())
}

/// Converts wire port numbers to TCP ports
pub fn validate_tcp_ports(ports: &[i32]) -> Result<Vec<u16>> {
    ports
        .iter()
        .map(|&port| {
            u16::try_from(port).map_err(|_| {
                VulnScanError::client_input(format!("tcp port out of range: {}", port))
            })
        })
        .collect()
}

/// Validates a target before it is passed to nmap
pub fn validate_target_for_engine(target: &str) -> std::result::Result<(), ScanEngineError> {
    if target.is_empty() {
        return Err(ScanEngineError::config("Target cannot be empty"));
    }

    if target.len() > constants::validation::MAX_TARGET_LENGTH {
        return Err(ScanEngineError::config(format!("Target too long: {}", target)));
    }

    if target.chars().any(char::is_whitespace) {
        return Err(ScanEngineError::config(format!(
            "Target contains invalid characters: {}",
            target
        )));
    }

    // Would be read by nmap as an option.
    if target.starts_with('-') {
        return Err(ScanEngineError::config(format!(
            "Target cannot start with '-': {}",
            target
        )));
    }

    Ok(())
}
