//! # Vulnerability Scan Service
//!
//! Runs one vulnerability check: derives the deadline, hands a
//! [`ScanParameters`] to the engine, classifies the outcome and normalizes the
//! raw result.
//!
//! This is the only place that decides what counts as a timeout. The engine
//! and the normalizer report what happened and nothing more.
//!
//! ## Example
//!
//! ```rust,no_run
//! use netvuln::entity::ScanRequest;
//! use netvuln::external::NmapScanner;
//! use netvuln::service::VulnersService;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(NmapScanner::new()?);
//!     let service = VulnersService::new(engine, Duration::from_secs(60), "scripts/vulners.nse");
//!
//!     let request = ScanRequest::new(vec!["127.0.0.1".to_string()], vec![22])?;
//!     for host in service.check_vuln(&request, None).await? {
//!         println!("{}: {} services", host.target_ip, host.services.len());
//!     }
//!     Ok(())
//! }
//! ```

use crate::entity::{HostResult, ScanRequest};
use crate::error::{Result, VulnScanError};
use crate::external::{ScanEngine, ScanParameters};
use crate::{logging, normalize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{error, warn, Instrument};

/// Orchestrates engine and normalizer for `CheckVuln` requests
///
/// Holds no per-request state, so one instance can serve concurrent calls.
#[derive(Clone)]
pub struct VulnersService {
    engine: Arc<dyn ScanEngine>,
    check_timeout: Duration,
    script_path: PathBuf,
}

impl VulnersService {
    pub fn new(
        engine: Arc<dyn ScanEngine>,
        check_timeout: Duration,
        script_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            check_timeout,
            script_path: script_path.into(),
        }
    }

    pub fn check_timeout(&self) -> Duration {
        self.check_timeout
    }

    /// The tighter of the configured check timeout and the caller's deadline
    pub fn derive_deadline(&self, caller_deadline: Option<Instant>) -> Instant {
        let own = Instant::now() + self.check_timeout;
        match caller_deadline {
            Some(caller) if caller < own => caller,
            _ => own,
        }
    }

    /// Scan the request's targets and report vulnerable services per host
    pub async fn check_vuln(
        &self,
        request: &ScanRequest,
        caller_deadline: Option<Instant>,
    ) -> Result<Vec<HostResult>> {
        let deadline = self.derive_deadline(caller_deadline);
        let params = ScanParameters::new(
            request.targets().to_vec(),
            request.ports().to_vec(),
            self.script_path.clone(),
            deadline,
        );

        let targets = request.targets().join(", ");
        let tcp_ports = params.port_list(", ");
        let span = logging::scan_span(&targets, &tcp_ports);

        self.run_scan(&params, &targets, &tcp_ports)
            .instrument(span)
            .await
    }

    async fn run_scan(
        &self,
        params: &ScanParameters,
        targets: &str,
        tcp_ports: &str,
    ) -> Result<Vec<HostResult>> {
        let deadline = params.deadline();
        let outcome = match timeout_at(deadline, self.engine.execute(params)).await {
            Err(_) => return Err(VulnScanError::ScanTimeout),
            Ok(Err(e)) => {
                log_warnings(e.warnings());
                if e.is_timeout() || Instant::now() >= deadline {
                    return Err(VulnScanError::ScanTimeout);
                }
                error!(targets = %targets, error = %e, "unable to run nmap scan");
                return Err(VulnScanError::ScanExecution(e));
            }
            Ok(Ok(outcome)) => outcome,
        };

        log_warnings(&outcome.warnings);

        let hosts = normalize::normalize(&outcome.run, params.targets(), params.script_id())
            .map_err(|e| {
                error!(targets = %targets, error = %e, "unable to normalize nmap result");
                e
            })?;

        logging::log_scan_completion(targets, tcp_ports, outcome.run.stats.elapsed);
        Ok(hosts)
    }
}

fn log_warnings(warnings: &[String]) {
    for warning in warnings {
        warn!(warning = %warning, "nmap run finished with warning");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanEngineError;
    use crate::external::ScanOutcome;
    use async_trait::async_trait;

    #[derive(Default)]
    struct FailingEngine {
        stderr: Vec<String>,
    }

    #[async_trait]
    impl ScanEngine for FailingEngine {
        async fn execute(
            &self,
            _params: &ScanParameters,
        ) -> std::result::Result<ScanOutcome, ScanEngineError> {
            Err(ScanEngineError::execution("nmap", "exit status 1").with_warnings(self.stderr.clone()))
        }
    }

    /// Collects everything a `fmt` subscriber writes
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn service(timeout: Duration) -> VulnersService {
        VulnersService::new(Arc::new(FailingEngine::default()), timeout, "vulners.nse")
    }

    #[tokio::test]
    async fn test_deadline_uses_check_timeout_without_caller() {
        let svc = service(Duration::from_secs(60));
        let before = Instant::now();
        let deadline = svc.derive_deadline(None);
        assert!(deadline >= before + Duration::from_secs(60));
        assert!(deadline <= Instant::now() + Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_deadline_prefers_tighter_caller_deadline() {
        let svc = service(Duration::from_secs(60));
        let caller = Instant::now() + Duration::from_secs(5);
        assert_eq!(svc.derive_deadline(Some(caller)), caller);
    }

    #[tokio::test]
    async fn test_deadline_ignores_looser_caller_deadline() {
        let svc = service(Duration::from_secs(1));
        let caller = Instant::now() + Duration::from_secs(600);
        assert!(svc.derive_deadline(Some(caller)) < caller);
    }

    #[tokio::test]
    async fn test_execution_failure_is_not_a_timeout() {
        let svc = service(Duration::from_secs(60));
        let request = ScanRequest::new(vec!["localhost".to_string()], vec![22]).unwrap();

        let err = svc.check_vuln(&request, None).await.unwrap_err();
        assert!(matches!(err, VulnScanError::ScanExecution(_)));
    }

    #[tokio::test]
    async fn test_warnings_of_failed_run_are_logged() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let engine = FailingEngine {
            stderr: vec!["Failed to resolve \"no-such-host\".".to_string()],
        };
        let svc = VulnersService::new(Arc::new(engine), Duration::from_secs(60), "vulners.nse");
        let request = ScanRequest::new(vec!["no-such-host".to_string()], vec![]).unwrap();

        let err = svc.check_vuln(&request, None).await.unwrap_err();
        match err {
            VulnScanError::ScanExecution(e) => assert_eq!(e.warnings().len(), 1),
            other => panic!("unexpected error {:?}", other),
        }

        let output = logs.contents();
        assert!(output.contains("WARN"), "{}", output);
        assert!(output.contains("nmap run finished with warning"), "{}", output);
        assert!(output.contains("no-such-host"), "{}", output);
    }
}
