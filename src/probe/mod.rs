//! Connection test
//!
//! Connects to the HTTPS server, completes a handshake with verification
//! disabled, issues one GET and reports what was negotiated. Whether the
//! chain would have verified against the CA is still measured and reported.

mod cipher;
mod report;

pub use cipher::{is_weak_cipher, CipherBreakdown};
pub use report::{HandshakeInfo, PeerCertificate, Performance, ProbeReport};

use bytes::Bytes;
use chrono::Utc;
use http::{header, Request};
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use log::{debug, info, warn};
use openssl::pkey::Id;
use openssl::ssl::SslRef;
use openssl::x509::X509VerifyResult;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_openssl::SslStream;

use crate::common::{WalkthroughError, Result};
use crate::pki::inspect::details_from_x509;
use crate::tls::{create_tls_connector, ConnectorOptions};

/// Default request path of the connection test
pub const DEFAULT_PROBE_PATH: &str = "/api/secure-test";

/// Connection test settings
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// CA used to decide `authorized`
    pub ca_cert: Option<PathBuf>,
    /// Certificate and key presented for mutual TLS
    pub client_identity: Option<(PathBuf, PathBuf)>,
    /// Bound on the whole exchange
    pub timeout: Duration,
    pub path: String,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            ca_cert: None,
            client_identity: None,
            timeout: Duration::from_secs(5),
            path: DEFAULT_PROBE_PATH.to_string(),
        }
    }
}

/// One connection test against `host:port`
#[derive(Debug, Clone)]
pub struct ConnectionProbe {
    host: String,
    port: u16,
    options: ProbeOptions,
}

impl ConnectionProbe {
    pub fn new(host: impl Into<String>, port: u16, options: ProbeOptions) -> Self {
        Self { host: host.into(), port, options }
    }

    pub fn url(&self) -> String {
        format!("https://{}:{}{}", self.host, self.port, self.options.path)
    }

    /// Run the test within the configured timeout
    pub async fn run(&self) -> Result<ProbeReport> {
        info!("Testing connection to {}", self.url());

        match timeout(self.options.timeout, self.exchange()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Connection test to {} timed out", self.url());
                Err(WalkthroughError::Timeout("connection timed out".to_string()))
            }
        }
    }

    async fn exchange(&self) -> Result<ProbeReport> {
        let started = Instant::now();

        let connector = create_tls_connector(&ConnectorOptions {
            ca_cert: self.options.ca_cert.clone(),
            client_identity: self.options.client_identity.clone(),
            verify_peer: false,
        })?;

        let tcp = TcpStream::connect((self.host.as_str(), self.port)).await?;
        let ssl = connector.configure()?.into_ssl(&self.host)?;
        let mut stream = SslStream::new(ssl, tcp)?;

        let handshake_started = Instant::now();
        Pin::new(&mut stream)
            .connect()
            .await
            .map_err(|e| WalkthroughError::TlsHandshake(e.to_string()))?;
        let handshake_time = handshake_started.elapsed();

        let certificate = self.peer_certificate(stream.ssl())?;
        let handshake = handshake_info(stream.ssl());
        debug!(
            "Handshake with {}:{} done in {:?}: {} {}",
            self.host, self.port, handshake_time, handshake.protocol, handshake.cipher
        );

        let (mut sender, connection) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| WalkthroughError::Http(format!("HTTP handshake failed: {}", e)))?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("HTTP connection ended with error: {}", e);
            }
        });

        let request = Request::get(self.options.path.as_str())
            .header(header::HOST, format!("{}:{}", self.host, self.port))
            .header(header::USER_AGENT, "tls-walkthrough")
            .header(header::ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|e| WalkthroughError::Http(format!("invalid request: {}", e)))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| WalkthroughError::Http(format!("request failed: {}", e)))?;
        let status = response.status().as_u16();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| WalkthroughError::Http(format!("failed to read response body: {}", e)))?
            .to_bytes();
        drop(sender);
        driver.abort();

        let response_data: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| WalkthroughError::Http(format!("failed to parse response: {}", e)))?;

        let report = ProbeReport {
            success: (200..300).contains(&status),
            timestamp: Utc::now(),
            handshake,
            certificate,
            performance: Performance {
                handshake_time_ms: handshake_time.as_millis() as u64,
                total_time_ms: started.elapsed().as_millis() as u64,
            },
            response_status: status,
            response_data,
        };

        info!(
            "Connection test finished: status {}, {} / {}, authorized: {}",
            report.response_status, report.handshake.protocol, report.handshake.cipher, report.certificate.authorized
        );
        Ok(report)
    }

    fn peer_certificate(&self, ssl: &SslRef) -> Result<PeerCertificate> {
        let cert = ssl.peer_certificate().ok_or_else(|| {
            WalkthroughError::Certificate("server presented no certificate".to_string())
        })?;
        let details = details_from_x509(&cert)?;

        let verify_result = ssl.verify_result();
        let authorized = self.options.ca_cert.is_some() && verify_result == X509VerifyResult::OK;
        if !authorized {
            debug!("Server certificate not verified: {}", verify_result.error_string());
        }

        Ok(PeerCertificate {
            subject: details.subject.clone(),
            issuer: details.issuer.clone(),
            valid: details.is_currently_valid(),
            authorized,
            expires_in: format!("{} days", details.days_remaining),
            days_remaining: details.days_remaining,
            fingerprint: details.fingerprint_sha256,
        })
    }
}

fn handshake_info(ssl: &SslRef) -> HandshakeInfo {
    let protocol = ssl.version_str().to_string();
    let (cipher, cipher_bits) = ssl
        .current_cipher()
        .map(|c| (c.name().to_string(), c.bits().secret))
        .unwrap_or_else(|| ("unknown".to_string(), 0));

    let auth_hint = ssl
        .peer_certificate()
        .and_then(|cert| cert.public_key().ok())
        .map(|key| match key.id() {
            Id::RSA => "RSA",
            Id::EC => "ECDSA",
            Id::ED25519 => "Ed25519",
            _ => "unknown",
        });

    let breakdown = CipherBreakdown::from_suite(&cipher, &protocol, auth_hint);

    HandshakeInfo {
        protocol,
        cipher,
        key_exchange: breakdown.key_exchange,
        authentication: breakdown.authentication,
        encryption: breakdown.encryption,
        mac: breakdown.mac,
        cipher_bits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_url() {
        let probe = ConnectionProbe::new("localhost", 8443, ProbeOptions::default());
        assert_eq!(probe.url(), "https://localhost:8443/api/secure-test");
        assert_eq!(probe.options.timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Grab a free port, then release it
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = ConnectionProbe::new("127.0.0.1", port, ProbeOptions::default());
        assert!(matches!(probe.run().await, Err(WalkthroughError::Io(_))));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hold = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let options = ProbeOptions { timeout: Duration::from_millis(200), ..Default::default() };
        let err = ConnectionProbe::new("127.0.0.1", port, options).run().await.unwrap_err();
        assert!(err.to_string().contains("connection timed out"));
        hold.abort();
    }

    /// TLS server answering every connection with `reply` and then closing
    async fn canned_tls_server(reply: &'static [u8]) -> (u16, tokio::task::JoinHandle<()>) {
        use crate::config::{ClientCertMode, WalkthroughConfig};
        use crate::pki::{CertificateRole, CertificateStore, LibraryIssuer};
        use crate::tls::create_tls_acceptor;
        use openssl::ssl::Ssl;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let dir = tempfile::tempdir().unwrap();
        let mut store = CertificateStore::new(dir.path(), Box::new(LibraryIssuer::new()), &WalkthroughConfig::default());
        store.generate(CertificateRole::Ca).unwrap();
        store.generate(CertificateRole::Server).unwrap();
        let ca = store.paths(CertificateRole::Ca);
        let server = store.paths(CertificateRole::Server);
        let acceptor = create_tls_acceptor(&server.cert, &server.key, &ca.cert, &ClientCertMode::None).unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let task = tokio::spawn(async move {
            let _dir = dir;
            let (socket, _) = listener.accept().await.unwrap();
            let ssl = Ssl::new(acceptor.context()).unwrap();
            let mut stream = SslStream::new(ssl, socket).unwrap();
            Pin::new(&mut stream).accept().await.unwrap();
            let mut head = [0u8; 1024];
            let _ = stream.read(&mut head).await;
            stream.write_all(reply).await.unwrap();
            let _ = stream.shutdown().await;
        });
        (port, task)
    }

    #[tokio::test]
    async fn test_truncated_body_is_an_error() {
        let (port, server) =
            canned_tls_server(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 64\r\n\r\n{\"secure\":true}").await;

        let err = ConnectionProbe::new("127.0.0.1", port, ProbeOptions::default()).run().await.unwrap_err();
        assert!(matches!(err, WalkthroughError::Http(_)), "unexpected error: {}", err);
        server.abort();
    }

    #[tokio::test]
    async fn test_chunked_json_response() {
        let (port, server) = canned_tls_server(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n6\r\n{\"secu\r\n9\r\nre\":true}\r\n0\r\n\r\n",
        )
        .await;

        let report = ConnectionProbe::new("127.0.0.1", port, ProbeOptions::default()).run().await.unwrap();
        assert!(report.success);
        assert_eq!(report.response_status, 200);
        assert_eq!(report.response_data["secure"], true);
        assert!(!report.certificate.authorized);
        server.abort();
    }
}
