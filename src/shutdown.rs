//! # Graceful Shutdown Module
//!
//! Listens for SIGINT and SIGTERM and lets the gRPC server drain in-flight
//! checks within a bounded time.
//!
//! ## Example
//!
//! ```rust,no_run
//! use netvuln::shutdown::ShutdownManager;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut shutdown = ShutdownManager::new(Duration::from_secs(30));
//!     shutdown.start_signal_handler()?;
//!
//!     let handle = shutdown.handle();
//!     let server = tokio::spawn(async move {
//!         handle.wait_for_shutdown().await;
//!     });
//!
//!     let signal = shutdown.wait_for_signal().await;
//!     println!("received {}", signal);
//!     shutdown.graceful_shutdown(server).await??;
//!     Ok(())
//! }
//! ```

use crate::error::{Result, VulnScanError};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{error, info};

/// Signal types that can trigger shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT (Ctrl+C)
    SigInt,
    /// SIGTERM (termination signal)
    SigTerm,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::SigInt => write!(f, "SIGINT"),
            ShutdownSignal::SigTerm => write!(f, "SIGTERM"),
        }
    }
}

/// Manages graceful shutdown operations
#[derive(Debug)]
pub struct ShutdownManager {
    /// Upper bound on draining in-flight work
    timeout: Duration,
    signal_rx: broadcast::Receiver<ShutdownSignal>,
    signal_tx: broadcast::Sender<ShutdownSignal>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownManager {
    /// Create a new shutdown manager with the specified drain timeout
    pub fn new(timeout: Duration) -> Self {
        let (signal_tx, signal_rx) = broadcast::channel(10);

        Self {
            timeout,
            signal_rx,
            signal_tx,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start listening for SIGINT and SIGTERM
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_signal_handler(&self) -> Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let signal_tx = self.signal_tx.clone();
        let shutdown_initiated = self.shutdown_initiated.clone();

        tokio::spawn(async move {
            let received = tokio::select! {
                _ = sigint.recv() => ShutdownSignal::SigInt,
                _ = sigterm.recv() => ShutdownSignal::SigTerm,
            };
            notify(&signal_tx, &shutdown_initiated, received);
        });

        Ok(())
    }

    /// Wait for the first shutdown signal
    ///
    /// Never resolves if no signal handler is running.
    pub async fn wait_for_signal(&mut self) -> ShutdownSignal {
        loop {
            match self.signal_rx.recv().await {
                Ok(signal) => return signal,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return std::future::pending().await,
            }
        }
    }

    /// Wait for `drain` to finish, giving up after the configured timeout
    ///
    /// Returns what `drain` produced, so a joined server task can still be
    /// checked for its own error.
    pub async fn graceful_shutdown<F>(&self, drain: F) -> Result<F::Output>
    where
        F: Future,
    {
        info!(timeout = ?self.timeout, "starting graceful shutdown");

        match timeout(self.timeout, drain).await {
            Ok(output) => {
                info!("graceful shutdown completed");
                Ok(output)
            }
            Err(_) => {
                error!(timeout = ?self.timeout, "graceful shutdown timed out");
                Err(VulnScanError::ShutdownTimeout {
                    duration_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Create a handle that can be moved into the server task
    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            signal_tx: self.signal_tx.clone(),
            shutdown_initiated: self.shutdown_initiated.clone(),
        }
    }
}

/// Mark shutdown as initiated and broadcast `signal`, once
fn notify(
    signal_tx: &broadcast::Sender<ShutdownSignal>,
    shutdown_initiated: &AtomicBool,
    signal: ShutdownSignal,
) {
    if !shutdown_initiated.fetch_or(true, Ordering::SeqCst) {
        info!(signal = %signal, "received signal, initiating shutdown");
        let _ = signal_tx.send(signal);
    }
}

/// A handle to the shutdown manager for observing shutdown
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    signal_tx: broadcast::Sender<ShutdownSignal>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Check if shutdown has been initiated
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been initiated
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.signal_tx.subscribe();
        // The flag is set before the signal is sent, so checking after
        // subscribing cannot miss a shutdown.
        if self.is_shutdown_initiated() {
            return;
        }
        let _ = rx.recv().await;
    }
}

#[cfg(test)]
impl ShutdownManager {
    /// Act as if the process had received `signal`
    fn trigger(&self, signal: ShutdownSignal) {
        notify(&self.signal_tx, &self.shutdown_initiated, signal);
    }
}
