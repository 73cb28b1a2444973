//! gRPC adapter for `NetVulnService`.
//!
//! Translates wire requests into [`ScanRequest`]s, runs them through the
//! [`VulnersService`] and maps every [`VulnScanError`] onto a status code.

use crate::constants::messages;
use crate::entity::{HostResult, ScanRequest};
use crate::error::VulnScanError;
use crate::service::VulnersService;
use crate::transport::proto::{
    self, net_vuln_service_server::NetVulnService, CheckVulnRequest, CheckVulnResponse,
};
use crate::validation;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};
use tracing::debug;

/// Header carrying the caller's remaining time budget
const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Taken off the caller's budget so the check gives up before the transport
/// cancels the call and a `DEADLINE_EXCEEDED` status still reaches the caller.
const CALLER_DEADLINE_MARGIN: Duration = Duration::from_millis(50);

/// Serves `CheckVuln` on top of a [`VulnersService`]
#[derive(Clone)]
pub struct GrpcController {
    service: Arc<VulnersService>,
}

impl GrpcController {
    pub fn new(service: Arc<VulnersService>) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl NetVulnService for GrpcController {
    async fn check_vuln(
        &self,
        request: Request<CheckVulnRequest>,
    ) -> Result<Response<CheckVulnResponse>, Status> {
        let caller_deadline = caller_deadline(request.metadata());
        let scan_request = to_scan_request(request.into_inner()).map_err(to_status)?;

        debug!(
            targets = ?scan_request.targets(),
            tcp_ports = ?scan_request.ports(),
            caller_deadline = caller_deadline.is_some(),
            "CheckVuln request"
        );

        let hosts = self
            .service
            .check_vuln(&scan_request, caller_deadline)
            .await
            .map_err(to_status)?;

        Ok(Response::new(to_response(hosts)))
    }
}

/// Validate a wire request: targets first, then ports
pub fn to_scan_request(request: CheckVulnRequest) -> crate::error::Result<ScanRequest> {
    validation::validate_targets(&request.targets)?;
    let ports = validation::validate_tcp_ports(&request.tcp_ports)?;
    ScanRequest::new(request.targets, ports)
}

/// Map a check failure onto the status returned to the caller
pub fn to_status(err: VulnScanError) -> Status {
    match &err {
        VulnScanError::ClientInput(msg) => Status::invalid_argument(msg.clone()),
        VulnScanError::ScanTimeout => Status::deadline_exceeded(err.to_string()),
        VulnScanError::ScanExecution(_)
        | VulnScanError::MalformedScanData(_)
        | VulnScanError::Config(_)
        | VulnScanError::Io(_)
        | VulnScanError::Transport(_)
        | VulnScanError::ShutdownTimeout { .. } => Status::internal(messages::CHECK_FAILED),
    }
}

/// Convert normalized hosts into the response, keeping host and service order
pub fn to_response(hosts: Vec<HostResult>) -> CheckVulnResponse {
    let results = hosts
        .into_iter()
        .map(|host| proto::TargetResult {
            target: host.target_ip,
            services: host
                .services
                .into_iter()
                .map(|service| proto::Service {
                    name: service.name,
                    version: service.version,
                    tcp_port: i32::from(service.tcp_port),
                    vulns: service
                        .vulns
                        .into_iter()
                        .map(|vuln| proto::Vulnerability {
                            identifier: vuln.identifier,
                            cvss_score: vuln.cvss_score,
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    CheckVulnResponse { results }
}

/// Deadline the caller attached to the call, if any
fn caller_deadline(metadata: &MetadataMap) -> Option<Instant> {
    let budget = metadata
        .get(GRPC_TIMEOUT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_grpc_timeout)?;

    Some(Instant::now() + budget.saturating_sub(CALLER_DEADLINE_MARGIN))
}

/// Parse a `grpc-timeout` value: up to eight digits followed by a unit
/// (`H`, `M`, `S`, `m`, `u`, `n`)
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || !value.is_ascii() {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    match unit {
        "H" => Some(Duration::from_secs(amount * 3600)),
        "M" => Some(Duration::from_secs(amount * 60)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}
