//! Connection handler module
//!
//! Completes the TLS handshake, then serves HTTP/1.1 on the encrypted
//! stream with keep-alive off: one request per connection.

use axum::{Extension, Router};
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use log::{debug, error, info, warn};
use openssl::ssl::{Ssl, SslAcceptor};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_openssl::SslStream;

use crate::common::{WalkthroughError, Result};
use crate::tls::SessionInfo;

/// Upper bound for buffered request data, head included
const MAX_REQUEST_BUFFER: usize = 16 * 1024;

/// Handle a single client connection
pub async fn handle_connection(
    client_stream: TcpStream,
    peer: SocketAddr,
    tls_acceptor: Arc<SslAcceptor>,
    router: Router,
    handshake_timeout: Duration,
) -> Result<()> {
    let ssl = Ssl::new(tls_acceptor.context())?;
    let mut stream = SslStream::new(ssl, client_stream)?;

    match timeout(handshake_timeout, Pin::new(&mut stream).accept()).await {
        Err(_) => {
            warn!("TLS handshake with {} timed out", peer);
            return Err(WalkthroughError::Timeout("TLS handshake timed out".to_string()));
        }
        Ok(Err(e)) => {
            error!("TLS handshake with {} failed: {}", peer, e);
            return Err(WalkthroughError::TlsHandshake(e.to_string()));
        }
        Ok(Ok(())) => {}
    }

    let session = SessionInfo::from_ssl(stream.ssl());
    debug!("TLS handshake with {} successful: {} {}", peer, session.protocol, session.cipher);
    if let Some(subject) = &session.peer_subject {
        info!("Client certificate subject: {}", subject);
    }

    let service = TowerToHyperService::new(router.layer(Extension(Arc::new(session))));

    http1::Builder::new()
        .keep_alive(false)
        .max_buf_size(MAX_REQUEST_BUFFER)
        .serve_connection(TokioIo::new(stream), service)
        .await
        .map_err(|e| WalkthroughError::Http(format!("connection with {} failed: {}", peer, e)))
}
