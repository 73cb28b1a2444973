#![allow(dead_code)]

use async_trait::async_trait;
use netvuln::error::ScanEngineError;
use netvuln::external::{NmapRun, ScanEngine, ScanOutcome, ScanParameters};
use netvuln::service::VulnersService;
use netvuln::transport::{GrpcController, NetVulnServiceClient, NetVulnServiceServer};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Server};

pub const LOCALHOST_VULNERS: &str = include_str!("../fixtures/localhost_vulners.xml");
pub const MALFORMED_CVSS: &str = include_str!("../fixtures/malformed_cvss.xml");
pub const NO_HOSTS: &str = include_str!("../fixtures/no_hosts.xml");

pub const SCRIPT_PATH: &str = "scripts/vulners.nse";

/// Replays a recorded nmap report and remembers what it was asked to scan
pub struct FixtureEngine {
    xml: &'static str,
    warnings: Vec<String>,
    calls: Mutex<Vec<(Vec<String>, Vec<u16>)>>,
}

impl FixtureEngine {
    pub fn new(xml: &'static str) -> Self {
        Self {
            xml,
            warnings: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_warnings(mut self, warnings: &[&str]) -> Self {
        self.warnings = warnings.iter().map(|w| w.to_string()).collect();
        self
    }

    /// Targets and ports of every call, in call order
    pub fn calls(&self) -> Vec<(Vec<String>, Vec<u16>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScanEngine for FixtureEngine {
    async fn execute(&self, params: &ScanParameters) -> Result<ScanOutcome, ScanEngineError> {
        self.calls
            .lock()
            .unwrap()
            .push((params.targets().to_vec(), params.ports().to_vec()));

        Ok(ScanOutcome {
            run: NmapRun::from_xml(self.xml)?,
            warnings: self.warnings.clone(),
        })
    }
}

/// Never finishes within any deadline a test uses
pub struct SlowEngine;

#[async_trait]
impl ScanEngine for SlowEngine {
    async fn execute(&self, _params: &ScanParameters) -> Result<ScanOutcome, ScanEngineError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(ScanOutcome {
            run: NmapRun::default(),
            warnings: Vec::new(),
        })
    }
}

/// Reports that its own timer ran out
pub struct TimedOutEngine;

#[async_trait]
impl ScanEngine for TimedOutEngine {
    async fn execute(&self, _params: &ScanParameters) -> Result<ScanOutcome, ScanEngineError> {
        Err(ScanEngineError::timeout(1000))
    }
}

/// Fails like nmap exiting with an error
pub struct BrokenEngine;

#[async_trait]
impl ScanEngine for BrokenEngine {
    async fn execute(&self, _params: &ScanParameters) -> Result<ScanOutcome, ScanEngineError> {
        Err(ScanEngineError::execution(
            "nmap",
            "exit status: 1: Failed to resolve \"no-such-host\".",
        ))
    }
}

pub fn targets(targets: &[&str]) -> Vec<String> {
    targets.iter().map(|t| t.to_string()).collect()
}

pub fn service(engine: Arc<dyn ScanEngine>, check_timeout: Duration) -> VulnersService {
    VulnersService::new(engine, check_timeout, SCRIPT_PATH)
}

/// A gRPC server on an ephemeral local port
pub struct TestServer {
    pub endpoint: String,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start(service: VulnersService) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let controller = GrpcController::new(Arc::new(service));
        tokio::spawn(async move {
            Server::builder()
                .add_service(NetVulnServiceServer::new(controller))
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            endpoint: format!("http://{}", addr),
            shutdown: Some(shutdown_tx),
        }
    }

    pub async fn client(&self) -> NetVulnServiceClient<Channel> {
        NetVulnServiceClient::connect(self.endpoint.clone())
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
