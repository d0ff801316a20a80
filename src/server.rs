//! Listener and acceptor
//!
//! One [`Server`] type serves both SOCKS variants; the configured
//! [`SocksVersion`](crate::config::SocksVersion) selects the handshake inside
//! each session. Every accepted connection runs in its own task.

use crate::config::ServerConfig;
use crate::helper::bind_listener;
use crate::socks::{handle_connection, SessionContext};
use anyhow::{anyhow, Context, Result};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// SOCKS proxy server
///
/// Cloning is cheap and every clone controls the same server, so `stop()`
/// can be called from a different task than the one blocked in `start()`.
#[derive(Debug, Clone)]
pub struct Server {
    config: Arc<ServerConfig>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<bool>,
}

impl Server {
    /// Create a server; the configuration is immutable from here on
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Server {
            config: Arc::new(config),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Whether the server is bound and has not been stopped
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Bind and listen on the configured address
    ///
    /// Marks the server as running. Errors here are fatal for the server and
    /// are returned to the caller.
    pub async fn bind(&self) -> Result<TcpListener> {
        let bind_addr = self.config.bind_addr();
        let addr = tokio::net::lookup_host(&bind_addr)
            .await
            .with_context(|| format!("Failed to resolve bind address {}", bind_addr))?
            .next()
            .ok_or_else(|| anyhow!("No address found for {}", bind_addr))?;

        let listener = bind_listener(addr, self.config.backlog)
            .with_context(|| format!("Failed to bind {}", addr))?;

        self.running.store(true, Ordering::Release);
        Ok(listener)
    }

    /// Accept connections on `listener` until stopped
    ///
    /// Returns `Ok(())` after [`stop`](Self::stop) and an error if the
    /// listening socket itself fails. The listener is closed on return.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let ctx = SessionContext::new(self.config.clone(), self.running.clone());

        match listener.local_addr() {
            Ok(addr) => info!("{} server listening on {}", self.config.version, addr),
            Err(_) => info!("{} server listening", self.config.version),
        }

        while self.is_running() {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!("Accepted connection from {}", peer);
                        tokio::spawn(handle_connection(stream, peer, ctx.clone()));
                    }
                    Err(e) if is_transient_accept_error(&e) => {
                        warn!("Failed to accept connection: {}", e);
                    }
                    Err(e) => {
                        error!("Listener failed: {}", e);
                        self.running.store(false, Ordering::Release);
                        return Err(e).context("Failed to accept connection");
                    }
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Bind, then serve until [`stop`](Self::stop) or a fatal accept error
    pub async fn start(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Stop accepting and wind down relays at their next poll tick
    ///
    /// Idempotent; only the first call on a running server has an effect.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("Stopping server");
            // No receiver just means serve() is not running yet or has returned
            let _ = self.shutdown_tx.send(true);
        }
    }
}

/// Errors that concern one incoming connection rather than the listener
fn is_transient_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}
