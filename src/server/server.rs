//! HTTPS test server
//!
//! Binds a listener, then serves TLS connections on a background task
//! until the returned handle asks it to stop.

use axum::Router;
use log::{debug, error, info};
use openssl::ssl::SslAcceptor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};

use crate::common::{WalkthroughError, Result};
use crate::config::WalkthroughConfig;
use super::handler::handle_connection;
use super::routes::router;

/// Per-connection behavior of the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Time allowed for the TLS handshake
    pub handshake_timeout: Duration,
    /// `Strict-Transport-Security` max-age, `None` to omit the header
    pub hsts_max_age: Option<u64>,
}

impl ServerOptions {
    pub fn from_config(config: &WalkthroughConfig) -> Self {
        Self {
            handshake_timeout: Duration::from_secs(config.handshake_timeout),
            hsts_max_age: config.hsts_max_age,
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::from_config(&WalkthroughConfig::default())
    }
}

/// A bound, not yet running, HTTPS server
pub struct SecureServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    tls_acceptor: Arc<SslAcceptor>,
    router: Router,
    handshake_timeout: Duration,
}

impl SecureServer {
    /// Bind `addr`; port 0 picks a free port
    pub async fn bind(addr: SocketAddr, tls_acceptor: SslAcceptor, options: ServerOptions) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(WalkthroughError::Io)?;
        let local_addr = listener.local_addr()?;
        debug!("Bound HTTPS listener on {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            tls_acceptor: Arc::new(tls_acceptor),
            router: router(options.hsts_max_age),
            handshake_timeout: options.handshake_timeout,
        })
    }

    /// Address actually bound
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve on a background task
    pub fn spawn(self) -> ServerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let local_addr = self.local_addr;
        let task = tokio::spawn(self.run(shutdown_rx));

        ServerHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        info!("HTTPS server listening on {}", self.local_addr);

        let mut tasks = JoinSet::new();

        loop {
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!("Task error: {}", e);
                }
            }

            tokio::select! {
                // Fires on an explicit stop and when the handle is dropped
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((client_stream, client_addr)) => {
                        debug!("Accepted connection from {}", client_addr);

                        let tls_acceptor = Arc::clone(&self.tls_acceptor);
                        let router = self.router.clone();
                        let handshake_timeout = self.handshake_timeout;

                        tasks.spawn(async move {
                            if let Err(e) = handle_connection(client_stream, client_addr, tls_acceptor, router, handshake_timeout).await {
                                debug!("Connection from {} ended with error: {}", client_addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                },
            }
        }

        let in_flight = tasks.len();
        tasks.shutdown().await;
        info!("HTTPS server on {} stopped ({} connections aborted)", self.local_addr, in_flight);
    }
}

/// Control handle of a running server
///
/// Dropping the handle stops the server too.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|task| task.is_finished()).unwrap_or(true)
    }

    /// Stop accepting, abort in-flight connections and wait for the loop to end
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| WalkthroughError::Other(format!("server task failed: {}", e)))?;
        }
        Ok(())
    }
}
