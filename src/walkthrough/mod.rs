//! Walkthrough context
//!
//! [`Walkthrough`] owns the state of the five steps: certificates, server,
//! client, connection test and security review. Every mutation goes
//! through `&mut self`, so the caller decides how (and whether) to share it.

mod state;

pub use state::{ClientOptions, ClientState, ServerState, ServerStatus};

use log::{info, warn};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::{check_file_exists, ensure_dir, parse_socket_addr, WalkthroughError, Result};
use crate::config::WalkthroughConfig;
use crate::pki::{create_issuer, CertificateIssuer, CertificateRole, CertificateStatus, CertificateStore, IssuedCertificate};
use crate::probe::{ConnectionProbe, ProbeOptions, ProbeReport, DEFAULT_PROBE_PATH};
use crate::security::{
    install_instructions, AssessmentInput, ChecklistItem, ChecklistStatus, Platform, SecurityChecklist,
};
use crate::server::{SecureServer, ServerHandle, ServerOptions};
use crate::tls::create_tls_acceptor;

/// Serializable snapshot of every step
#[derive(Debug, Clone, Serialize)]
pub struct WalkthroughSummary {
    pub certificates: CertificateStatus,
    pub server: ServerState,
    pub client: ClientState,
    pub checklist: Vec<ChecklistItem>,
}

/// State of one walkthrough
pub struct Walkthrough {
    config: WalkthroughConfig,
    certificates: CertificateStore,
    server: ServerState,
    client: ClientState,
    checklist: SecurityChecklist,
    running: Option<ServerHandle>,
}

impl Walkthrough {
    /// Start a fresh walkthrough with the configured issuer
    pub fn new(config: WalkthroughConfig) -> Result<Self> {
        let issuer = create_issuer(config.backend, &config);
        Self::with_issuer(config, issuer)
    }

    /// Start a fresh walkthrough with a specific issuer
    pub fn with_issuer(config: WalkthroughConfig, issuer: Box<dyn CertificateIssuer>) -> Result<Self> {
        config.validate()?;
        ensure_dir(&config.cert_dir)?;

        let certificates = CertificateStore::new(&config.cert_dir, issuer, &config);
        Ok(Self::from_parts(config, certificates))
    }

    /// Continue from certificates already present in the certificate directory
    pub fn resume(config: WalkthroughConfig) -> Result<Self> {
        config.validate()?;
        ensure_dir(&config.cert_dir)?;

        let issuer = create_issuer(config.backend, &config);
        let certificates = CertificateStore::load_existing(&config.cert_dir, issuer, &config)?;
        Ok(Self::from_parts(config, certificates))
    }

    fn from_parts(config: WalkthroughConfig, certificates: CertificateStore) -> Self {
        info!(
            "Walkthrough ready in {} ({} issuer)",
            config.cert_dir.display(),
            certificates.issuer_name()
        );
        Self {
            server: ServerState::new(config.server_port),
            client: ClientState::default(),
            checklist: SecurityChecklist::default(),
            running: None,
            certificates,
            config,
        }
    }

    pub fn config(&self) -> &WalkthroughConfig {
        &self.config
    }

    pub fn certificates(&self) -> &CertificateStore {
        &self.certificates
    }

    // --- Step 1: certificates ---

    pub fn certificate_status(&self) -> CertificateStatus {
        self.certificates.status()
    }

    /// Issue the certificate of `role`; leaves need the CA first
    ///
    /// The CA cannot be reissued while the server runs. Reissuing it
    /// unconfigures the server and the client certificate, whose records
    /// the store drops.
    pub fn generate_certificate(&mut self, role: CertificateRole) -> Result<&IssuedCertificate> {
        if self.running.is_some() {
            match role {
                CertificateRole::Ca => {
                    return Err(WalkthroughError::Precondition(
                        "stop the server before reissuing the CA".to_string(),
                    ));
                }
                CertificateRole::Server => {
                    warn!("Reissuing the server certificate; the running server keeps the old one until restarted");
                }
                CertificateRole::Client => {}
            }
        }

        self.certificates.generate(role)?;

        if role == CertificateRole::Ca {
            if self.server.configured || self.client.present_client_certificate {
                warn!("CA regenerated: configure the server and client again once their certificates are reissued");
            }
            self.server = ServerState::new(self.server.port);
            self.client.configured = false;
            self.client.present_client_certificate = false;
        }

        self.certificates.get(role).ok_or_else(|| {
            WalkthroughError::NotFound(format!("{} certificate record", role.label()))
        })
    }

    pub fn ca_certificate_pem(&self) -> Result<String> {
        self.certificates.ca_certificate_pem()
    }

    pub fn export_ca(&self, dest: &Path) -> Result<PathBuf> {
        self.certificates.export_ca(dest)
    }

    /// CA installation steps, quoting the server port
    pub fn install_instructions(&self, platform: Platform) -> Vec<String> {
        install_instructions(platform, self.server.port)
    }

    // --- Step 2: server ---

    pub fn server_status(&self) -> &ServerState {
        &self.server
    }

    /// Configure the server on `port` (configured default when `None`)
    pub fn configure_server(&mut self, port: Option<u16>) -> Result<&ServerState> {
        if self.running.is_some() {
            return Err(WalkthroughError::Precondition(
                "stop the server before reconfiguring it".to_string(),
            ));
        }
        if self.certificates.server().is_none() {
            return Err(WalkthroughError::Precondition(
                "the server certificate must be generated first".to_string(),
            ));
        }

        let port = port.unwrap_or(self.config.server_port);
        self.server = ServerState {
            configured: true,
            port,
            status: ServerStatus::Configured,
        };
        info!("SSL server configured on port {}", port);
        Ok(&self.server)
    }

    /// Start the HTTPS server, returning the bound address
    pub async fn start_server(&mut self) -> Result<SocketAddr> {
        if self.running.is_some() {
            return Err(WalkthroughError::Precondition("the server is already running".to_string()));
        }
        if !self.server.configured {
            return Err(WalkthroughError::Precondition(
                "the server must be configured first".to_string(),
            ));
        }
        if self.certificates.get(CertificateRole::Server).is_none() {
            return Err(WalkthroughError::Precondition(
                "the server certificate must be generated first".to_string(),
            ));
        }

        let server_paths = self.certificates.paths(CertificateRole::Server);
        let ca_paths = self.certificates.paths(CertificateRole::Ca);
        check_file_exists(&server_paths.cert)?;
        check_file_exists(&server_paths.key)?;

        let acceptor = create_tls_acceptor(
            &server_paths.cert,
            &server_paths.key,
            &ca_paths.cert,
            &self.config.client_cert_mode,
        )?;

        let addr = parse_socket_addr(&format!("{}:{}", self.config.bind_host, self.server.port))?;
        let server = SecureServer::bind(addr, acceptor, ServerOptions::from_config(&self.config)).await?;
        let handle = server.spawn();
        let local_addr = handle.local_addr();

        self.server.port = local_addr.port();
        self.server.status = ServerStatus::Running;
        self.running = Some(handle);

        info!("HTTPS server started on port {}", local_addr.port());
        Ok(local_addr)
    }

    /// Stop the HTTPS server; returns whether one was running
    pub async fn stop_server(&mut self) -> Result<bool> {
        let Some(handle) = self.running.take() else {
            info!("No HTTPS server was running");
            return Ok(false);
        };

        handle.shutdown().await?;
        self.server.status = ServerStatus::Stopped;
        info!("HTTPS server stopped");
        Ok(true)
    }

    /// `https://localhost:<port>/` of the running server
    pub fn server_url(&self) -> Option<String> {
        self.running
            .as_ref()
            .map(|handle| format!("https://{}:{}/", self.probe_host(), handle.local_addr().port()))
    }

    // --- Step 3: client ---

    pub fn client_status(&self) -> &ClientState {
        &self.client
    }

    pub fn configure_client(&mut self, options: ClientOptions) -> Result<&ClientState> {
        if options.present_client_certificate && self.certificates.client().is_none() {
            return Err(WalkthroughError::Precondition(
                "the client certificate must be generated first".to_string(),
            ));
        }

        self.client.configured = true;
        self.client.present_client_certificate = options.present_client_certificate;
        info!(
            "SSL client configured (client certificate: {})",
            if options.present_client_certificate { "presented" } else { "not presented" }
        );
        Ok(&self.client)
    }

    // --- Step 4: connection test ---

    fn probe_host(&self) -> String {
        match self.config.bind_host.as_str() {
            "127.0.0.1" | "0.0.0.0" | "::" | "::1" | "[::]" | "[::1]" => "localhost".to_string(),
            other => other.to_string(),
        }
    }

    /// Run the connection test against the running server
    pub async fn test_connection(&mut self) -> Result<ProbeReport> {
        if !self.server.configured || !self.client.configured {
            return Err(WalkthroughError::Precondition(
                "server and client must be configured first".to_string(),
            ));
        }
        let port = match &self.running {
            Some(handle) => handle.local_addr().port(),
            None => {
                return Err(WalkthroughError::Precondition("the server is not running".to_string()));
            }
        };

        let ca_cert = self
            .certificates
            .get(CertificateRole::Ca)
            .map(|ca| ca.cert_path.clone());
        let client_identity = if self.client.present_client_certificate {
            let client = self.certificates.get(CertificateRole::Client).ok_or_else(|| {
                WalkthroughError::Precondition("the client certificate must be generated first".to_string())
            })?;
            Some((client.cert_path.clone(), client.key_path.clone()))
        } else {
            None
        };

        let probe = ConnectionProbe::new(
            self.probe_host(),
            port,
            ProbeOptions {
                ca_cert,
                client_identity,
                timeout: Duration::from_secs(self.config.probe_timeout),
                path: DEFAULT_PROBE_PATH.to_string(),
            },
        );

        let report = probe.run().await?;
        self.client.connection_tested = true;
        self.client.last_test = Some(report.clone());
        Ok(report)
    }

    // --- Step 5: security review ---

    pub fn checklist(&self) -> &SecurityChecklist {
        &self.checklist
    }

    pub fn update_checklist_item(&mut self, id: u32, status: ChecklistStatus) -> Result<&ChecklistItem> {
        self.checklist.update(id, status)
    }

    /// Decide checklist items from the certificates, last test and server
    pub fn assess_security(&mut self) -> &SecurityChecklist {
        let last_test = self.client.last_test.as_ref();
        let input = AssessmentInput {
            certificates: [self.certificates.ca(), self.certificates.server(), self.certificates.client()]
                .into_iter()
                .flatten()
                .cloned()
                .collect(),
            expiry_warning_days: self.config.expiry_warning_days,
            negotiated_protocol: last_test.map(|report| report.handshake.protocol.clone()),
            negotiated_cipher: last_test.map(|report| report.handshake.cipher.clone()),
            hsts_active: self
                .running
                .as_ref()
                .map(|_| self.config.hsts_max_age.map_or(false, |age| age > 0)),
        };

        let decided = self.checklist.assess(&input);
        info!(
            "Security assessment decided {} items, {} of {} completed",
            decided.len(),
            self.checklist.completed(),
            self.checklist.items().len()
        );
        &self.checklist
    }

    pub fn summary(&self) -> WalkthroughSummary {
        WalkthroughSummary {
            certificates: self.certificate_status(),
            server: self.server.clone(),
            client: self.client.clone(),
            checklist: self.checklist.items().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::issuer::MockCertificateIssuer;

    fn config(dir: &Path) -> WalkthroughConfig {
        WalkthroughConfig {
            cert_dir: dir.to_path_buf(),
            server_port: 0,
            ..Default::default()
        }
    }

    fn mock_issuer() -> Box<MockCertificateIssuer> {
        let mut issuer = MockCertificateIssuer::new();
        issuer.expect_name().return_const("mock");
        issuer.expect_issue_leaf().never();
        Box::new(issuer)
    }

    #[test]
    fn test_step_preconditions() {
        let dir = tempfile::tempdir().unwrap();
        let mut walkthrough = Walkthrough::with_issuer(config(dir.path()), mock_issuer()).unwrap();

        let err = walkthrough.generate_certificate(CertificateRole::Server).unwrap_err();
        assert!(matches!(err, WalkthroughError::Precondition(_)));

        assert!(matches!(walkthrough.configure_server(None), Err(WalkthroughError::Precondition(_))));
        assert!(!walkthrough.server_status().configured);

        let options = ClientOptions { present_client_certificate: true };
        assert!(matches!(walkthrough.configure_client(options), Err(WalkthroughError::Precondition(_))));
        assert!(walkthrough.configure_client(ClientOptions::default()).unwrap().configured);
    }

    #[tokio::test]
    async fn test_connection_requires_running_server() {
        let dir = tempfile::tempdir().unwrap();
        let mut walkthrough = Walkthrough::with_issuer(config(dir.path()), mock_issuer()).unwrap();

        let err = walkthrough.test_connection().await.unwrap_err();
        assert!(matches!(err, WalkthroughError::Precondition(_)));
        assert!(!walkthrough.client_status().connection_tested);

        assert!(matches!(walkthrough.start_server().await, Err(WalkthroughError::Precondition(_))));
        assert!(!walkthrough.stop_server().await.unwrap());
    }

    #[test]
    fn test_ca_reissue_unconfigures_steps() {
        let dir = tempfile::tempdir().unwrap();
        let mut walkthrough = Walkthrough::new(config(dir.path())).unwrap();
        for role in CertificateRole::ALL {
            walkthrough.generate_certificate(role).unwrap();
        }
        walkthrough.configure_server(Some(9443)).unwrap();
        walkthrough
            .configure_client(ClientOptions { present_client_certificate: true })
            .unwrap();

        walkthrough.generate_certificate(CertificateRole::Ca).unwrap();

        assert_eq!(walkthrough.server_status(), &ServerState::new(9443));
        assert!(!walkthrough.client_status().configured);
        assert!(!walkthrough.client_status().present_client_certificate);
        assert!(walkthrough.certificates().get(CertificateRole::Server).is_none());
        assert!(matches!(walkthrough.configure_server(None), Err(WalkthroughError::Precondition(_))));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = WalkthroughConfig { key_bits: 512, ..config(dir.path()) };
        assert!(matches!(Walkthrough::new(config), Err(WalkthroughError::Config(_))));
    }

    #[test]
    fn test_checklist_update_and_instructions() {
        let dir = tempfile::tempdir().unwrap();
        let mut walkthrough = Walkthrough::with_issuer(config(dir.path()), mock_issuer()).unwrap();

        walkthrough.update_checklist_item(1, ChecklistStatus::Completed).unwrap();
        assert!(matches!(
            walkthrough.update_checklist_item(9, ChecklistStatus::Completed),
            Err(WalkthroughError::NotFound(_))
        ));

        // Nothing measured yet: only the manual update stands
        walkthrough.assess_security();
        assert_eq!(walkthrough.checklist().completed(), 2);

        assert_eq!(walkthrough.install_instructions(Platform::Windows).len(), 7);
        let summary = serde_json::to_value(walkthrough.summary()).unwrap();
        assert_eq!(summary["server"]["status"], "stopped");
    }
}
