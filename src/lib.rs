//! # netvuln - network vulnerability checks over gRPC
//!
//! netvuln exposes a single gRPC method, `CheckVuln`, that runs nmap with
//! service detection and the vulners NSE script against a set of targets and
//! returns, per host, the detected services together with their known
//! vulnerabilities and CVSS scores.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netvuln::config::Config;
//! use netvuln::entity::ScanRequest;
//! use netvuln::external::NmapScanner;
//! use netvuln::service::VulnersService;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config/config.yaml")?;
//!     let service = VulnersService::new(
//!         Arc::new(NmapScanner::new()?),
//!         config.vulners.check_timeout,
//!         "scripts/vulners.nse",
//!     );
//!
//!     let request = ScanRequest::new(vec!["127.0.0.1".to_string()], vec![22, 80])?;
//!     let hosts = service.check_vuln(&request, None).await?;
//!
//!     println!("{} hosts scanned", hosts.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`transport`]: gRPC messages, generated stubs and the request adapter
//! - [`service`]: deadline handling and orchestration of one check
//! - [`external`]: the nmap scan engine and its XML model
//! - [`normalize`]: turns raw nmap output into [`entity`] results
//! - [`validation`]: request and engine argument checks
//! - [`config`], [`logging`], [`shutdown`]: process setup and teardown
//! - [`error`]: error taxonomy shared by all layers
//! - [`constants`]: defaults and fixed messages

pub mod config;
pub mod constants;
pub mod entity;
pub mod error;
pub mod external;
pub mod logging;
pub mod normalize;
pub mod service;
pub mod shutdown;
pub mod transport;
pub mod validation;
