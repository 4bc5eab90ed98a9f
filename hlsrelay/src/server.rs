//! Server lifecycle management
//!
//! Binds the HTTP listener, serves the relay router and drains in-flight
//! requests when SIGTERM or Ctrl+C arrives.

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use tracing::{error, info};

/// HTTP relay server
pub struct RelayServer {
    address: String,
    router: Router,
}

impl RelayServer {
    pub const fn new(address: String, router: Router) -> Self {
        Self { address, router }
    }

    /// Serve until a shutdown signal is received
    pub async fn run(self) -> anyhow::Result<()> {
        let http_addr: SocketAddr = self
            .address
            .parse()
            .with_context(|| format!("Invalid HTTP address '{}'", self.address))?;

        let listener = tokio::net::TcpListener::bind(http_addr)
            .await
            .with_context(|| format!("Failed to bind HTTP address {http_addr}"))?;

        info!("HTTP server listening on {}", http_addr);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server error")?;

        info!("HTTP server shut down gracefully");
        Ok(())
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C signal");
            }
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("Shutdown signal received, starting graceful shutdown...");
}
