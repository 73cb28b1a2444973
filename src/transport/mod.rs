//! # Transport
//!
//! The gRPC surface of netvuln: wire messages and generated stubs in
//! [`proto`], the request/response adapter in [`grpc`].

pub mod grpc;
pub mod proto;

pub use grpc::GrpcController;
pub use proto::net_vuln_service_client::NetVulnServiceClient;
pub use proto::net_vuln_service_server::NetVulnServiceServer;

use crate::error::Result;
use std::future::Future;
use std::net::SocketAddr;
use tracing::info;

/// Serve `NetVulnService` on `addr` until `shutdown` resolves
///
/// In-flight checks are allowed to finish once `shutdown` fires; the caller
/// bounds how long that may take.
pub async fn serve<F>(addr: SocketAddr, controller: GrpcController, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    info!(address = %addr, "gRPC server started");

    tonic::transport::Server::builder()
        .add_service(NetVulnServiceServer::new(controller))
        .serve_with_shutdown(addr, shutdown)
        .await?;

    info!("gRPC server stopped");
    Ok(())
}
