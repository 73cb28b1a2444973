// netvuln - gRPC service checking network hosts for known vulnerabilities

use clap::Parser;
use colored::*;
use netvuln::config::{format_duration, Config};
use netvuln::constants;
use netvuln::error::{Result, VulnScanError};
use netvuln::external::NmapScanner;
use netvuln::service::VulnersService;
use netvuln::shutdown::ShutdownManager;
use netvuln::transport::{self, GrpcController};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{error, info};

/// Check network hosts for known vulnerabilities with nmap and vulners
#[derive(Debug, Parser)]
#[command(name = "netvuln", version)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Path to the vulners NSE script
    #[arg(short, long)]
    script: PathBuf,
}

/// Application entry point
#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{} {}", "ERROR".red().bold(), e);
            process::exit(1);
        }
    };

    let _guards = match netvuln::logging::init_logging(&config.logger) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("{} {}", "ERROR".red().bold(), e);
            process::exit(1);
        }
    };

    if let Err(e) = run(config, args.script).await {
        error!(error = %e, "netvuln stopped with error");
        eprintln!("{} {}", "✗".red().bold(), e);
        process::exit(1);
    }
}

/// Wire the service together and serve until a shutdown signal arrives
async fn run(config: Config, script: PathBuf) -> Result<()> {
    if !script.is_file() {
        return Err(VulnScanError::config(format!(
            "vulners script not found: {}",
            script.display()
        )));
    }

    let engine = NmapScanner::new().map_err(|e| VulnScanError::config(e.to_string()))?;
    let service = VulnersService::new(Arc::new(engine), config.vulners.check_timeout, script.clone());
    let controller = GrpcController::new(Arc::new(service));

    info!(
        port = config.grpc.port,
        check_timeout = %format_duration(config.vulners.check_timeout),
        script = %script.display(),
        "starting netvuln"
    );

    let mut shutdown = ShutdownManager::new(Duration::from_secs(constants::SHUTDOWN_TIMEOUT_SECS));
    shutdown.start_signal_handler()?;

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.grpc.port));
    let handle = shutdown.handle();
    let mut server = tokio::spawn(transport::serve(addr, controller, async move {
        handle.wait_for_shutdown().await
    }));

    let signal = tokio::select! {
        signal = shutdown.wait_for_signal() => signal,
        // The server only returns on its own when it failed to start or crashed.
        joined = &mut server => return server_exit(joined),
    };

    info!(signal = %signal, "shutting down gRPC server");
    server_exit(shutdown.graceful_shutdown(&mut server).await?)
}

/// Outcome of the joined server task
fn server_exit(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(VulnScanError::config(format!("gRPC server task failed: {}", e))),
    }
}
